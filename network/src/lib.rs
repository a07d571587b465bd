extern crate primitives;

mod consensus;
mod network;

pub use consensus::{
	ConsensusParams, HEIGHT_KGW_END, HEIGHT_KGW_START, HEIGHT_LEGACY_SWITCH_1,
	HEIGHT_LEGACY_SWITCH_2,
};
pub use network::Network;
