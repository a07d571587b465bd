use std::sync::Arc;
use parking_lot::Mutex;
use chain::BlockIndexNode;
use network::ConsensusParams;
use primitives::compact::Compact;
use error::Error;
use integrator;
use kgw::{kgw_v1, kgw_v2};
use legacy::legacy_retarget;
use pid::{PidConfig, PidState, RetargetStats};

const KGW_V1_MIN_BLOCKS: u32 = 120;
const KGW_V1_MAX_BLOCKS: u32 = 3360;
const KGW_V2_MIN_BLOCKS: u32 = 120;
const KGW_V2_MAX_BLOCKS: u32 = 3360;

/// The literal fixed difficulty mined at the exact height the network's KGW-v1 switch
/// activates, bridging the KGW-v2/PID/legacy eras to KGW-v1 without a discontinuity.
const AIP09_BRIDGE_BITS: u32 = 0x1e0ffff0;

/// Process-wide handle to the PID controller's live state.
///
/// Clones share the same underlying lock, matching a single chain's single controller
/// instance; `retarget_pid_reset` swaps the whole `PidState` out when its tunable gains
/// change, and every other method locks just long enough to read or update it.
pub struct RetargetPid<T: BlockIndexNode> {
	inner: Arc<Mutex<Option<PidState<T>>>>,
}

impl<T: BlockIndexNode> Clone for RetargetPid<T> {
	fn clone(&self) -> Self {
		RetargetPid { inner: self.inner.clone() }
	}
}

impl<T: BlockIndexNode> Default for RetargetPid<T> {
	fn default() -> Self {
		RetargetPid { inner: Arc::new(Mutex::new(None)) }
	}
}

impl<T: BlockIndexNode> RetargetPid<T> {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_initialized(&self) -> bool {
		self.inner.lock().is_some()
	}

	/// Parses a `"<prop_gain> <integration_time> <integ_gain> <deriv_gain>"` parameter
	/// string and, if it differs from the live gains (or none exist yet), builds a fresh
	/// controller and immediately charges it against `tip`. A malformed string is reported
	/// as an error rather than silently discarding the previous controller state.
	pub fn retarget_pid_reset(&self, param_string: &str, config: PidConfig, tip: T, params: &ConsensusParams) -> Result<bool, Error> {
		let tokens: Vec<&str> = param_string.split_whitespace().collect();
		if tokens.len() != 4 {
			return Err(Error::ConfigParseFailed);
		}
		let prop_gain: f64 = tokens[0].parse().map_err(|_| Error::ConfigParseFailed)?;
		let integration_time: i64 = tokens[1].parse().map_err(|_| Error::ConfigParseFailed)?;
		let integ_gain: f64 = tokens[2].parse().map_err(|_| Error::ConfigParseFailed)?;
		let deriv_gain: f64 = tokens[3].parse().map_err(|_| Error::ConfigParseFailed)?;

		let mut guard = self.inner.lock();
		if let Some(existing) = guard.as_ref() {
			if existing.matches_gains(prop_gain, integration_time, integ_gain, deriv_gain) {
				return Ok(false);
			}
		}

		let mut state = PidState::new(prop_gain, integration_time, integ_gain, deriv_gain, config);
		state.prime(tip, params.target_spacing, params.hardfork_block_2);
		*guard = Some(state);
		Ok(true)
	}

	/// Re-charges the controller's caches against the current tip. A no-op (returning
	/// `false`) if the controller has not been initialized yet.
	pub fn set_retarget_to_block(&self, tip: T, params: &ConsensusParams) -> bool {
		let mut guard = self.inner.lock();
		let state = match guard.as_mut() {
			Some(state) => state,
			None => {
				debug!("set_retarget_to_block: no RetargetPid controller to update");
				return false;
			}
		};
		let primed = state.prime(tip, params.target_spacing, params.hardfork_block_2);
		if !primed {
			debug!("set_retarget_to_block: insufficient history at height {}", tip.height());
		}
		primed
	}

	pub fn get_retarget_stats(&self, at_height: i32, tip: T, params: &ConsensusParams) -> Option<RetargetStats> {
		let mut guard = self.inner.lock();
		guard.as_mut().and_then(|state| state.get_retarget_stats(at_height, tip, params))
	}

	/// Estimated number of blocks a fresh integrator charge would sample, for diagnostics
	/// before the controller has necessarily run at this exact height.
	pub fn calc_block_index_required(&self, tip: Option<T>, params: &ConsensusParams) -> u32 {
		let guard = self.inner.lock();
		let integration_time = guard.as_ref().map(|s| s.integration_time).unwrap_or(params.target_timespan);
		integrator::calc_block_index_required(tip, integration_time, params.target_spacing)
	}

	fn next_work_required(&self, tip: T, header_time: i64, params: &ConsensusParams) -> Compact {
		let mut guard = self.inner.lock();
		match guard.as_mut() {
			Some(state) => {
				state.update_output(tip, header_time, params);
				Compact::from_u256(state.uint_target_after_limits)
			}
			None => Compact::from_u256(params.pow_limit),
		}
	}
}

/// Picks the active retarget algorithm for the block that would follow `tip` and computes
/// its next target.
///
/// Height gating mirrors the chain's consensus history: below `aip09_height`, mainnet runs
/// legacy retargeting through the KGW-v1 start, KGW-v2 through the KGW-v1 end, then the PID
/// controller; every other network runs the PID controller for its entire history below
/// `aip09_height`. At `aip09_height` exactly, every network bridges to a fixed difficulty;
/// above it, every network runs KGW-v1.
pub fn next_work_required<T: BlockIndexNode>(pid: &RetargetPid<T>, tip: T, header_time: i64, params: &ConsensusParams) -> Compact {
	let height = tip.height() + 1;

	if height < params.aip09_height {
		if params.is_main_network() {
			if height > params.height_kgw_start && height <= params.height_kgw_end {
				kgw_v2(tip, params.target_spacing, KGW_V2_MIN_BLOCKS, KGW_V2_MAX_BLOCKS, params.pow_limit)
			} else if height > params.height_kgw_end {
				pid.next_work_required(tip, header_time, params)
			} else {
				legacy_retarget(tip, params.height_legacy_switch_1, params.height_legacy_switch_2, params.pow_limit)
			}
		} else {
			pid.next_work_required(tip, header_time, params)
		}
	} else if height == params.aip09_height {
		Compact::new(AIP09_BRIDGE_BITS)
	} else {
		kgw_v1(tip, params.target_spacing, KGW_V1_MIN_BLOCKS, KGW_V1_MAX_BLOCKS, params.pow_limit)
	}
}

#[cfg(test)]
mod tests {
	use chain::{BlockHeader, HeaderArena, BlockIndexNode};
	use network::{ConsensusParams, Network};
	use primitives::bigint::U256;
	use primitives::compact::Compact;
	use primitives::hash::H256;
	use pid::PidConfig;
	use super::{RetargetPid, next_work_required};

	fn push(arena: &mut HeaderArena, prev: Option<usize>, time: u32, bits: Compact) -> usize {
		arena.push(
			BlockHeader {
				version: 1,
				previous_header_hash: H256::default(),
				merkle_root_hash: H256::default(),
				time,
				bits,
				nonce: 0,
			},
			prev,
			U256::zero(),
			U256::zero(),
		)
	}

	#[test]
	fn uninitialized_pid_falls_back_to_pow_limit() {
		let mut params = ConsensusParams::new(Network::Mainnet);
		params.aip09_height = 0;
		let mut arena = HeaderArena::new();
		let bits = Compact::new(0x1e0ffff0);
		let idx = push(&mut arena, None, 1_000, bits);
		let tip = arena.node(idx);
		let pid = RetargetPid::new();
		let result = next_work_required(&pid, tip, tip.time() + 180, &params);
		assert_eq!(result, Compact::from_u256(params.pow_limit));
	}

	#[test]
	fn aip09_height_bridges_to_fixed_difficulty() {
		let mut params = ConsensusParams::new(Network::Mainnet);
		let mut arena = HeaderArena::new();
		let bits = Compact::new(0x1e0ffff0);
		let mut prev = None;
		for i in 0..5u32 {
			prev = Some(push(&mut arena, prev, 1_000 + i * 180, bits));
		}
		let tip = arena.node(prev.unwrap());
		params.aip09_height = tip.height() + 1;
		let pid = RetargetPid::new();
		let result = next_work_required(&pid, tip, tip.time() + 180, &params);
		assert_eq!(result, Compact::new(0x1e0ffff0));
	}

	#[test]
	fn above_aip09_dispatches_to_kgw_v1() {
		let mut params = ConsensusParams::new(Network::Mainnet);
		let bits = Compact::new(0x1e0ffff0);
		let arena_len = 200u32;
		let mut arena = HeaderArena::new();
		let mut prev = None;
		for i in 0..arena_len {
			prev = Some(push(&mut arena, prev, 1_000 + i * 180, bits));
		}
		let tip = arena.node(prev.unwrap());
		params.aip09_height = 1;
		let pid = RetargetPid::new();
		let result = next_work_required(&pid, tip, tip.time() + 180, &params);
		assert_eq!(result, bits);
	}

	#[test]
	fn reset_then_dispatch_runs_pid_path() {
		let mut params = ConsensusParams::new(Network::Testnet);
		params.aip09_height = i32::max_value();
		let bits = Compact::new(0x1e0ffff0);
		let mut arena = HeaderArena::new();
		let mut prev = None;
		for i in 0..60u32 {
			prev = Some(push(&mut arena, prev, 1_000 + i * 180, bits));
		}
		let tip = arena.node(prev.unwrap());
		let pid = RetargetPid::new();
		let config = PidConfig::new(params.pow_limit >> 4);
		assert!(pid.retarget_pid_reset("0.37 345600 1.0 0.27", config, tip, &params).unwrap());
		assert!(pid.is_initialized());
		let result = next_work_required(&pid, tip, tip.time() + 180, &params);
		assert_eq!(result, bits);
	}

	#[test]
	fn reset_rejects_malformed_parameter_string() {
		let params = ConsensusParams::new(Network::Testnet);
		let mut arena = HeaderArena::new();
		let idx = push(&mut arena, None, 1_000, Compact::new(0x1e0ffff0));
		let tip = arena.node(idx);
		let pid = RetargetPid::new();
		let config = PidConfig::new(params.pow_limit >> 4);
		assert!(pid.retarget_pid_reset("not enough", config, tip, &params).is_err());
		assert!(!pid.is_initialized());
	}

	#[test]
	fn reset_with_unchanged_gains_is_noop() {
		let mut params = ConsensusParams::new(Network::Testnet);
		params.aip09_height = i32::max_value();
		let bits = Compact::new(0x1e0ffff0);
		let mut arena = HeaderArena::new();
		let mut prev = None;
		for i in 0..60u32 {
			prev = Some(push(&mut arena, prev, 1_000 + i * 180, bits));
		}
		let tip = arena.node(prev.unwrap());
		let pid = RetargetPid::new();
		let config = PidConfig::new(params.pow_limit >> 4);
		assert!(pid.retarget_pid_reset("0.37 345600 1.0 0.27", config, tip, &params).unwrap());
		assert!(!pid.retarget_pid_reset("0.37 345600 1.0 0.27", config, tip, &params).unwrap());
	}
}
