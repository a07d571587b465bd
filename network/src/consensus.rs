use primitives::bigint::U256;
use network::Network;

/// Height at which the `<H1` legacy retarget mode switches to the wider 4x timespan mode.
pub const HEIGHT_LEGACY_SWITCH_1: i32 = 15420;
/// Height at which legacy retargeting switches to per-block (`newTargetTimespan`) mode.
pub const HEIGHT_LEGACY_SWITCH_2: i32 = 77777;
/// First height of the Kimoto Gravity Well era.
pub const HEIGHT_KGW_START: i32 = 87777;
/// Last height of the Kimoto Gravity Well era; the PID controller takes over above it.
pub const HEIGHT_KGW_END: i32 = 555555;

/// Parameters that influence retarget consensus.
#[derive(Debug, Clone)]
pub struct ConsensusParams {
	/// Network.
	pub network: Network,
	/// Minimum-difficulty target (easiest allowed).
	pub pow_limit: U256,
	/// Target spacing between blocks, in seconds.
	pub target_spacing: i64,
	/// Target timespan of an averaging window, in seconds.
	pub target_timespan: i64,
	/// Whether blocks may be mined at minimum difficulty after a spacing timeout
	/// (testnet-style allowance).
	pub allow_min_difficulty_blocks: bool,
	/// Disables retargeting entirely (regtest).
	pub no_retargeting: bool,
	/// Height at which the KGW-v1 algorithm becomes active for this network variant.
	pub aip09_height: i32,
	/// Height at which the PID controller's second-era constants become active.
	pub hardfork_block_2: i32,
	/// First height of the legacy-mode-switch window.
	pub height_legacy_switch_1: i32,
	/// Second height of the legacy-mode-switch window.
	pub height_legacy_switch_2: i32,
	/// First height of the Kimoto Gravity Well era.
	pub height_kgw_start: i32,
	/// Last height of the Kimoto Gravity Well era.
	pub height_kgw_end: i32,
}

impl ConsensusParams {
	pub fn new(network: Network) -> Self {
		match network {
			Network::Mainnet => ConsensusParams {
				network,
				pow_limit: U256::max_value() >> 20,
				target_spacing: 180,
				target_timespan: 2050,
				allow_min_difficulty_blocks: false,
				no_retargeting: false,
				aip09_height: i32::max_value(),
				hardfork_block_2: 1_125_000,
				height_legacy_switch_1: HEIGHT_LEGACY_SWITCH_1,
				height_legacy_switch_2: HEIGHT_LEGACY_SWITCH_2,
				height_kgw_start: HEIGHT_KGW_START,
				height_kgw_end: HEIGHT_KGW_END,
			},
			Network::Testnet => ConsensusParams {
				network,
				pow_limit: U256::max_value() >> 16,
				target_spacing: 180,
				target_timespan: 2050,
				allow_min_difficulty_blocks: true,
				no_retargeting: false,
				aip09_height: i32::max_value(),
				hardfork_block_2: 1_125_000,
				height_legacy_switch_1: HEIGHT_LEGACY_SWITCH_1,
				height_legacy_switch_2: HEIGHT_LEGACY_SWITCH_2,
				height_kgw_start: HEIGHT_KGW_START,
				height_kgw_end: HEIGHT_KGW_END,
			},
			Network::Regtest => ConsensusParams {
				network,
				pow_limit: U256::max_value() >> 1,
				target_spacing: 180,
				target_timespan: 2050,
				allow_min_difficulty_blocks: true,
				no_retargeting: true,
				aip09_height: 0,
				hardfork_block_2: 1_125_000,
				height_legacy_switch_1: 0,
				height_legacy_switch_2: 0,
				height_kgw_start: 0,
				height_kgw_end: 0,
			},
		}
	}

	pub fn is_main_network(&self) -> bool {
		self.network == Network::Mainnet
	}

	pub fn network_name(&self) -> &'static str {
		self.network.name()
	}
}
