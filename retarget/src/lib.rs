//! Proof-of-work difficulty retargeting for a Bitcoin-derived chain that has run through
//! several retarget algorithms across its history: a legacy pre-Kimoto-Gravity-Well scheme,
//! two revisions of the gravity well itself, and finally a PID controller tuned around a
//! 3-minute block spacing.
//!
//! The algorithms are pure functions over anything implementing `chain::BlockIndexNode`;
//! the only mutable state in this crate is the PID controller's cached integrator/tip-filter
//! charge, held behind `RetargetPid`.

extern crate chain;
extern crate network;
extern crate primitives;
#[macro_use]
extern crate log;
extern crate parking_lot;
#[cfg(feature = "serde-support")]
extern crate serde;

pub mod error;
mod integrator;
mod kgw;
mod kgw_curve;
mod legacy;
mod tip_filter;
mod pid;
mod dispatch;
mod work;

pub use error::Error;
pub use kgw::{kgw_v1, kgw_v2};
pub use legacy::{classic_retarget, legacy_retarget};
pub use tip_filter::{FilterPoint, TipFilter};
pub use pid::{PidConfig, PidState, RetargetStats};
pub use dispatch::{next_work_required, RetargetPid};
pub use work::{
	check_proof_of_work,
	check_proof_of_work_for_network,
	check_proof_of_work_with_min_difficulty_allowance,
	linear_work,
	log2_work,
	network_hash_ps,
	network_hash_ps_over_chain,
	work_proof,
};
