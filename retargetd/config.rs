use clap;
use network::{ConsensusParams, Network};
use primitives::bigint::U256;
use retarget::PidConfig;

/// Parsed command-line configuration for the `retargetd` diagnostic binary.
///
/// Mirrors the shape of `pzec::config::Config`: a `clap::ArgMatches` goes in, a flat
/// struct of already-validated fields comes out. This binary does not load a real block
/// index or consensus-params file -- the out-of-scope collaborators the core spec names --
/// so several fields here (`blocks`, `spacing`) describe the synthetic chain it builds to
/// exercise `next_work_required` against.
pub struct Config {
	pub network: Network,
	pub consensus: ConsensusParams,
	pub pid_config: PidConfig,
	pub blocks: u32,
	pub spacing: u32,
	pub pid_reset: Option<String>,
	pub show_stats: bool,
	pub quiet: bool,
}

pub fn parse(matches: &clap::ArgMatches) -> Result<Config, String> {
	let network = match (matches.is_present("testnet"), matches.is_present("regtest")) {
		(true, false) => Network::Testnet,
		(false, true) => Network::Regtest,
		(false, false) => Network::Mainnet,
		(true, true) => return Err("only one of --testnet / --regtest can be used".into()),
	};

	let consensus = ConsensusParams::new(network);

	let blocks = match matches.value_of("blocks") {
		Some(s) => s.parse().map_err(|_| "invalid --blocks: expected an integer".to_owned())?,
		None => 60,
	};

	let spacing = match matches.value_of("spacing") {
		Some(s) => s.parse().map_err(|_| "invalid --spacing: expected an integer".to_owned())?,
		None => consensus.target_spacing as u32,
	};

	let tip_filter_blocks: i32 = match matches.value_of("tipfilterblocks") {
		Some(s) => s.parse().map_err(|_| "invalid --tipfilterblocks: expected an integer".to_owned())?,
		None => 21,
	};
	if tip_filter_blocks < 5 {
		return Err("--tipfilterblocks must be at least 5".into());
	}

	let starting_diff_divisor: f64 = match matches.value_of("startingdiff") {
		Some(s) => s.parse().map_err(|_| "invalid --startingdiff: expected a number".to_owned())?,
		None => 1.0,
	};
	if starting_diff_divisor <= 0.0 {
		return Err("--startingdiff must be positive".into());
	}

	let max_diff_increase: u32 = match matches.value_of("maxdiffincrease") {
		Some(s) => s.parse().map_err(|_| "invalid --maxdiffincrease: expected an integer".to_owned())?,
		None => 200,
	};
	let max_diff_decrease: u32 = match matches.value_of("maxdiffdecrease") {
		Some(s) => s.parse().map_err(|_| "invalid --maxdiffdecrease: expected an integer".to_owned())?,
		None => 170,
	};
	if max_diff_increase < 101 || max_diff_decrease < 101 {
		return Err("--maxdiffincrease / --maxdiffdecrease must each be at least 101".into());
	}

	// The divisor is a tuning knob, not a consensus value in its own right, so a lossy
	// float-to-integer reduction of `pow_limit` is acceptable here (`>= 1` guards the
	// degenerate divide-by-zero case from a divisor close enough to zero to round down).
	let divisor = (starting_diff_divisor.round() as u64).max(1);
	let testnet_starting_difficulty = consensus.pow_limit / U256::from(divisor);

	let pid_config = PidConfig {
		tip_filter_blocks,
		uses_header: matches.is_present("useheader"),
		max_diff_increase,
		max_diff_decrease,
		testnet_starting_difficulty,
	};

	Ok(Config {
		network,
		consensus,
		pid_config,
		blocks,
		spacing,
		pid_reset: matches.value_of("pid-reset").map(|s| s.to_owned()),
		show_stats: matches.is_present("stats"),
		quiet: matches.is_present("quiet"),
	})
}
