use chain::BlockIndexNode;
use network::ConsensusParams;
use primitives::bigint::U256;
use primitives::compact::Compact;

const LEGACY_TARGET_SPACING: i64 = 205;
const LEGACY_TARGET_TIMESPAN: i64 = 86184;
const NEW_TARGET_TIMESPAN: i64 = 2050;

/// Pre-Kimoto-Gravity-Well retarget, carried forward from the chain's earliest days and
/// still consensus-relevant below the KGW start height. Two historical mode switches
/// (`height_legacy_switch_1`, `height_legacy_switch_2`) change both the averaging window
/// and the clamp ratios applied to it; their exact ordering and the asymmetric `/4`
/// minimum-clamp between the two switches are preserved verbatim even though the second
/// looks like an undocumented quirk.
pub fn legacy_retarget<T: BlockIndexNode>(tip: T, switch_1: i32, switch_2: i32, pow_limit: U256) -> Compact {
	let height = tip.height() + 1;
	let mut new_protocol = height >= switch_1;
	let mut new_protocol_2 = false;
	let mut timespan_current = LEGACY_TARGET_TIMESPAN;

	if height >= switch_2 {
		new_protocol_2 = true;
		new_protocol = false;
	}

	if new_protocol {
		timespan_current *= 4;
	}
	if new_protocol_2 {
		timespan_current = NEW_TARGET_TIMESPAN;
	}
	let interval = timespan_current / LEGACY_TARGET_SPACING;

	// Only change once per interval, or exactly at the first protocol switch height.
	if height as i64 % interval != 0 && !new_protocol_2 && height != switch_1 {
		return tip.bits();
	}

	let mut blocks_to_go_back = interval - 1;
	if height as i64 != interval {
		blocks_to_go_back = interval;
	}
	// Jump back what amounts to a fixed 14-day window once protocol 2 is active.
	blocks_to_go_back = if new_protocol_2 { NEW_TARGET_TIMESPAN / 205 } else { blocks_to_go_back };

	let first = match tip.ancestor(blocks_to_go_back as u32) {
		Some(first) => first,
		None => return Compact::from_u256(pow_limit),
	};

	let mut new_setpoint = tip.time() - first.time();
	let averaged_max = if new_protocol { timespan_current * 4 } else { (timespan_current * 99) / 70 };
	let averaged_min = if new_protocol { timespan_current / 4 } else { (timespan_current * 70) / 99 };

	if height >= switch_2 {
		if new_setpoint < averaged_min {
			new_setpoint = averaged_min;
		}
		if new_setpoint > averaged_max {
			new_setpoint = averaged_max;
		}
	} else if height > switch_1 {
		if new_setpoint < averaged_min / 4 {
			new_setpoint = averaged_min / 4;
		}
		if new_setpoint > averaged_max {
			new_setpoint = averaged_max;
		}
	} else {
		if new_setpoint < averaged_min {
			new_setpoint = averaged_min;
		}
		if new_setpoint > averaged_max {
			new_setpoint = averaged_max;
		}
	}

	let (mut bn, _negative, _overflow) = tip.bits().to_u256_lossy();
	bn = bn * U256::from(new_setpoint as u64);
	bn = bn / U256::from(if new_protocol_2 { timespan_current } else { LEGACY_TARGET_TIMESPAN } as u64);

	if bn > pow_limit {
		bn = pow_limit;
	}
	Compact::from_u256(bn)
}

/// Plain classic-Bitcoin difficulty adjustment: one retarget every
/// `target_timespan / target_spacing` blocks, clamped to a 4x swing per adjustment. This
/// algorithm is never reached by `next_work_required`'s height dispatch on this chain's
/// mainnet history, but the same formula is what an unmodified Bitcoin derivative would run,
/// and is kept available for networks or tooling that want it directly.
pub fn classic_retarget<T: BlockIndexNode>(tip: T, header_time: i64, params: &ConsensusParams) -> Compact {
	let height = tip.height() + 1;
	let interval = (params.target_timespan / params.target_spacing) as i32;

	if height % interval != 0 {
		if params.allow_min_difficulty_blocks {
			if header_time > tip.time() + params.target_spacing * 2 {
				return Compact::from_u256(params.pow_limit);
			}
			let mut node = tip;
			loop {
				let candidate = match node.prev() {
					Some(prev) => prev,
					None => break,
				};
				if candidate.height() % interval == 0 || candidate.bits() != Compact::from_u256(params.pow_limit) {
					break;
				}
				node = candidate;
			}
			return node.bits();
		}
		return tip.bits();
	}

	let blocks_to_go_back = if height == interval { interval - 1 } else { interval };
	let first = match tip.ancestor(blocks_to_go_back as u32) {
		Some(first) => first,
		None => return tip.bits(),
	};
	calculate_next_work_required(tip, first.time(), params)
}

fn calculate_next_work_required<T: BlockIndexNode>(tip: T, first_block_time: i64, params: &ConsensusParams) -> Compact {
	if params.no_retargeting {
		return tip.bits();
	}

	let mut actual_timespan = tip.time() - first_block_time;
	let min_timespan = params.target_timespan / 4;
	let max_timespan = params.target_timespan * 4;
	if actual_timespan < min_timespan {
		actual_timespan = min_timespan;
	}
	if actual_timespan > max_timespan {
		actual_timespan = max_timespan;
	}

	let (mut bn, _negative, _overflow) = tip.bits().to_u256_lossy();
	let shift = bn.bit_length() > 235;
	if shift {
		bn = bn >> 1usize;
	}
	bn = bn * U256::from(actual_timespan as u64);
	bn = bn / U256::from(params.target_timespan as u64);
	if shift {
		bn = bn << 1usize;
	}

	if bn > params.pow_limit {
		bn = params.pow_limit;
	}
	Compact::from_u256(bn)
}

#[cfg(test)]
mod tests {
	use chain::{BlockHeader, HeaderArena, BlockIndexNode};
	use network::{ConsensusParams, Network};
	use primitives::bigint::U256;
	use primitives::compact::Compact;
	use primitives::hash::H256;
	use super::{legacy_retarget, classic_retarget};

	const SWITCH_1: i32 = 15420;
	const SWITCH_2: i32 = 77777;

	fn pow_limit() -> U256 {
		U256::max_value() >> 20
	}

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
	fn off_retarget_height_returns_previous_bits() {
		// A tiny chain below switch_1, not aligned to the legacy interval boundary.
		let mut arena = HeaderArena::new();
		let genesis_bits = Compact::new(0x1e0ffff0);
		let mut prev = Some(push(&mut arena, None, 1_000, genesis_bits));
		for i in 1..5u32 {
			prev = Some(push(&mut arena, prev, 1_000 + i * 420, genesis_bits));
		}
		let tip = arena.node(prev.unwrap());
		// height 4 -> next height 5, interval = 86184/205 = 420, not a boundary.
		let result = legacy_retarget(tip, SWITCH_1, SWITCH_2, pow_limit());
		assert_eq!(result, genesis_bits);
	}

	#[test]
	fn result_never_exceeds_pow_limit() {
		let mut arena = HeaderArena::new();
		let bits = Compact::from_u256(pow_limit());
		let mut prev = None;
		// Build exactly one legacy interval's worth of blocks (heights 0..419), evenly spaced,
		// so the next height (420) lands exactly on the retarget boundary.
		for i in 0..420u32 {
			prev = Some(push(&mut arena, prev, 1_000 + i * 205, bits));
		}
		let tip = arena.node(prev.unwrap());
		let result = legacy_retarget(tip, SWITCH_1, SWITCH_2, pow_limit());
		let value = result.to_u256_lossy().0;
		assert!(value <= pow_limit());
	}

	#[test]
	fn classic_off_interval_returns_previous_bits() {
		let mut params = ConsensusParams::new(Network::Mainnet);
		params.target_spacing = 205;
		params.target_timespan = 86184;
		params.allow_min_difficulty_blocks = false;
		let mut arena = HeaderArena::new();
		let bits = Compact::new(0x1e0ffff0);
		let mut prev = Some(push(&mut arena, None, 1_000, bits));
		for i in 1..5u32 {
			prev = Some(push(&mut arena, prev, 1_000 + i * 205, bits));
		}
		let tip = arena.node(prev.unwrap());
		let result = classic_retarget(tip, tip.time(), &params);
		assert_eq!(result, bits);
	}

	#[test]
	fn classic_result_never_exceeds_pow_limit() {
		let mut params = ConsensusParams::new(Network::Mainnet);
		params.target_spacing = 205;
		params.target_timespan = 86184;
		params.allow_min_difficulty_blocks = false;
		params.pow_limit = pow_limit();
		let interval = (params.target_timespan / params.target_spacing) as u32;
		let mut arena = HeaderArena::new();
		let bits = Compact::from_u256(pow_limit());
		let mut prev = None;
		for i in 0..interval {
			prev = Some(push(&mut arena, prev, 1_000 + i * 205, bits));
		}
		let tip = arena.node(prev.unwrap());
		let result = classic_retarget(tip, tip.time(), &params);
		let value = result.to_u256_lossy().0;
		assert!(value <= pow_limit());
	}
}
