//! `retargetd` -- a small diagnostic CLI wrapping the `retarget` crate.
//!
//! Bitcoind-derived nodes load the difficulty retargeting core against a real, disk-backed
//! block index and consensus-params file; both of those are out-of-scope collaborators for
//! this workspace. This binary instead builds a synthetic, evenly-spaced `HeaderArena` chain
//! of the requested length and spacing and drives `next_work_required`/`get_retarget_stats`
//! against it, so the core can be exercised and its output inspected from the command line
//! without a running node.

extern crate chain;
extern crate clap;
#[macro_use]
extern crate log;
extern crate logs;
extern crate network;
extern crate primitives;
extern crate retarget;

mod config;

use std::process;
use clap::{App, Arg};
use chain::{BlockHeader, HeaderArena, BlockIndexNode};
use primitives::compact::Compact;
use primitives::hash::H256;
use retarget::RetargetPid;

fn main() {
	let matches = App::new("retargetd")
		.version("0.1.0")
		.about("Difficulty retargeting diagnostic CLI")
		.arg(Arg::with_name("testnet").long("testnet").help("Use testnet consensus parameters"))
		.arg(Arg::with_name("regtest").long("regtest").help("Use regtest consensus parameters"))
		.arg(Arg::with_name("blocks").long("blocks").takes_value(true).help("Length of the synthetic chain to build [default: 60]"))
		.arg(Arg::with_name("spacing").long("spacing").takes_value(true).help("Seconds between synthetic block timestamps [default: network target spacing]"))
		.arg(Arg::with_name("tipfilterblocks").long("tipfilterblocks").takes_value(true).help("retargetpid.tipfilterblocks [default: 21]"))
		.arg(Arg::with_name("useheader").long("useheader").help("retargetpid.useheader"))
		.arg(Arg::with_name("startingdiff").long("startingdiff").takes_value(true).help("retargetpid.startingdiff [default: 1.0]"))
		.arg(Arg::with_name("maxdiffincrease").long("maxdiffincrease").takes_value(true).help("retargetpid.maxdiffincrease [default: 200]"))
		.arg(Arg::with_name("maxdiffdecrease").long("maxdiffdecrease").takes_value(true).help("retargetpid.maxdiffdecrease [default: 170]"))
		.arg(Arg::with_name("pid-reset").long("pid-reset").takes_value(true).help("\"prop_gain integration_time integ_gain deriv_gain\" to prime the PID controller before retargeting"))
		.arg(Arg::with_name("stats").long("stats").help("Print the PID controller's retarget stats snapshot"))
		.arg(Arg::with_name("quiet").short("q").long("quiet").help("Suppress informational logging"))
		.get_matches();

	if let Err(e) = logs::init(logs::LogConfig { mode: None, color: !matches.is_present("quiet") }) {
		eprintln!("failed to initialize logging: {}", e);
	}

	let config = match config::parse(&matches) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("retargetd: {}", e);
			process::exit(1);
		}
	};

	if let Err(e) = run(config) {
		error!("{}", e);
		process::exit(1);
	}
}

fn run(config: config::Config) -> Result<(), String> {
	if config.blocks < 2 {
		return Err("--blocks must build at least 2 headers".into());
	}

	let starting_bits = Compact::from_u256(config.consensus.pow_limit);
	let mut arena = HeaderArena::new();
	let mut prev = None;
	for i in 0..config.blocks {
		prev = Some(arena.push(
			BlockHeader {
				version: 1,
				previous_header_hash: H256::default(),
				merkle_root_hash: H256::default(),
				time: i * config.spacing,
				bits: starting_bits,
				nonce: 0,
			},
			prev,
			primitives::bigint::U256::zero(),
			primitives::bigint::U256::zero(),
		));
	}
	let tip = arena.tip().expect("at least 2 blocks were just pushed");
	let header_time = tip.time() + config.spacing as i64;

	info!(
		"network={} tip_height={} tip_time={} header_time={}",
		config.network, tip.height(), tip.time(), header_time,
	);

	let pid = RetargetPid::new();
	if let Some(param_string) = config.pid_reset.as_ref() {
		match pid.retarget_pid_reset(param_string, config.pid_config, tip, &config.consensus) {
			Ok(changed) => info!("pid-reset applied, gains changed: {}", changed),
			Err(e) => return Err(format!("pid-reset failed: {:?}", e)),
		}
	}

	let next_bits = retarget::next_work_required(&pid, tip, header_time, &config.consensus);
	println!("next bits: {}", next_bits);

	if config.show_stats {
		match pid.get_retarget_stats(tip.height() + 1, tip, &config.consensus) {
			Some(stats) => println!("{:#?}", stats),
			None => println!("(no PID stats available at this height)"),
		}
	}

	Ok(())
}
