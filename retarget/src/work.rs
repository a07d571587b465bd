use chain::BlockIndexNode;
use network::ConsensusParams;
use primitives::bigint::U256;
use primitives::compact::Compact;

/// Returns true if `hash` meets the target encoded by `bits`, and that target itself does
/// not exceed the network's minimum-difficulty limit.
pub fn check_proof_of_work(hash: U256, bits: Compact, pow_limit: U256) -> bool {
	match decode_target(bits, pow_limit) {
		Some(target) => hash <= target,
		None => false,
	}
}

/// Testnet/regtest bootstrap allowance: a hash that misses its own target is still
/// accepted if the network permits minimum-difficulty blocks, the claimed bits equal the
/// configured starting difficulty, and the hash still meets the network's overall limit.
/// This lets mocktime chains bootstrap without waiting out the real spacing.
pub fn check_proof_of_work_with_min_difficulty_allowance(
	hash: U256,
	bits: Compact,
	pow_limit: U256,
	testnet_starting_difficulty: Compact,
	allow_min_difficulty_blocks: bool,
) -> bool {
	if check_proof_of_work(hash, bits, pow_limit) {
		return true;
	}
	if !allow_min_difficulty_blocks || bits != testnet_starting_difficulty {
		return false;
	}
	hash <= pow_limit
}

/// Convenience form of the proof-of-work check driven directly by a network's consensus
/// parameters: uses the minimum-difficulty bootstrap allowance (against
/// `testnet_starting_difficulty`) on networks that permit it, and the plain check everywhere
/// else.
pub fn check_proof_of_work_for_network(
	hash: U256,
	bits: Compact,
	params: &ConsensusParams,
	testnet_starting_difficulty: Compact,
) -> bool {
	if params.allow_min_difficulty_blocks {
		check_proof_of_work_with_min_difficulty_allowance(
			hash,
			bits,
			params.pow_limit,
			testnet_starting_difficulty,
			params.allow_min_difficulty_blocks,
		)
	} else {
		check_proof_of_work(hash, bits, params.pow_limit)
	}
}

fn decode_target(bits: Compact, pow_limit: U256) -> Option<U256> {
	let target = bits.to_u256().ok()?;
	if target.is_zero() || target > pow_limit {
		None
	} else {
		Some(target)
	}
}

/// Proof-of-work represented by a target: `(~target / (target + 1)) + 1`, zero for a zero
/// target. This is the quantity that accumulates additively into chain work.
pub fn work_proof(target: U256) -> U256 {
	if target.is_zero() {
		return U256::zero();
	}
	(!target / (target + U256::one())) + U256::one()
}

/// Base-2 logarithm of the work proof, for diagnostics only.
pub fn log2_work(target: U256) -> f64 {
	let proof = work_proof(target);
	if proof.is_zero() {
		return 0.0;
	}
	proof.to_f64().log2()
}

/// Linear-scale difficulty relative to the network's easiest target, for diagnostics only.
pub fn linear_work(target: U256, pow_limit: U256) -> f64 {
	if target.is_zero() {
		return 0.0;
	}
	let scaled = pow_limit * U256::from(1000u32);
	(scaled / target).to_f64() / 1000.0
}

/// Diagnostic network hashrate estimate over a lookback window, derived from the ratio of
/// accumulated chain work to elapsed time. Never feeds back into a retarget decision.
///
/// `tip_time`/`stop_time` are expected to be the max/min timestamps observed across the
/// window (mining races mean the window's endpoints are not necessarily its extremes in
/// arrival order) -- `network_hash_ps_over_chain` below does that walk for a caller that
/// only has a tip handle.
pub fn network_hash_ps(tip_work: U256, tip_time: i64, stop_work: U256, stop_time: i64, lookup: i64) -> f64 {
	if lookup < 2 || tip_time == stop_time {
		return 0.0;
	}
	let work_diff = (tip_work - stop_work).to_f64() / lookup as f64;
	let time_diff = (tip_time - stop_time) as f64 / (lookup - 1) as f64;
	(work_diff / time_diff).round()
}

/// Walks back up to `lookup` blocks from `tip`, tracking the earliest and latest timestamps
/// seen (never assuming arrival order is monotone), then feeds the chain-work delta between
/// `tip` and the walk's endpoint into `network_hash_ps`. `lookup` is clamped to `[2, tip
/// height]`, matching the legacy helper this is grounded on.
pub fn network_hash_ps_over_chain<T: BlockIndexNode>(tip: T, lookup: i64) -> f64 {
	if tip.height() == 0 {
		return 0.0;
	}
	let lookup = lookup.max(2).min(tip.height() as i64);

	let mut min_time = tip.time();
	let mut max_time = tip.time();
	let mut node = tip;
	let mut steps = 1;
	while steps < lookup && node.height() > 1 {
		node = match node.prev() {
			Some(prev) => prev,
			None => break,
		};
		let time = node.time();
		if time < min_time {
			min_time = time;
		}
		if time > max_time {
			max_time = time;
		}
		steps += 1;
	}

	network_hash_ps(tip.chain_work(), max_time, node.chain_work(), min_time, lookup)
}

#[cfg(test)]
mod tests {
	use primitives::bigint::U256;
	use primitives::compact::Compact;
	use super::*;

	fn pow_limit() -> U256 {
		U256::max_value() >> 20
	}

	#[test]
	fn min_difficulty_hash_verifies() {
		let bits = Compact::from_u256(pow_limit());
		let hash: U256 = 1u32.into();
		assert!(check_proof_of_work(hash, bits, pow_limit()));
	}

	#[test]
	fn hash_above_target_rejected() {
		let target: U256 = 100u32.into();
		let bits = Compact::from_u256(target);
		let hash: U256 = 200u32.into();
		assert!(!check_proof_of_work(hash, bits, pow_limit()));
	}

	#[test]
	fn target_above_limit_rejected() {
		let bits = Compact::from_u256(pow_limit() + U256::one());
		let hash: U256 = 1u32.into();
		assert!(!check_proof_of_work(hash, bits, pow_limit()));
	}

	#[test]
	fn min_difficulty_allowance_accepts_stale_testnet_block() {
		let starting = Compact::from_u256(pow_limit() >> 4);
		let hash = pow_limit();
		assert!(check_proof_of_work_with_min_difficulty_allowance(
			hash, starting, pow_limit(), starting, true,
		));
	}

	#[test]
	fn network_hash_ps_zero_for_degenerate_lookback() {
		assert_eq!(network_hash_ps(U256::from(10u32), 100, U256::zero(), 100, 10), 0.0);
		assert_eq!(network_hash_ps(U256::from(10u32), 100, U256::zero(), 0, 1), 0.0);
	}

	#[test]
	fn network_hash_ps_matches_legacy_scaling() {
		// 10 lookups of work over a 9-block span at one unit of work per block: hash rate 1/s.
		let result = network_hash_ps(U256::from(10u32), 9, U256::zero(), 0, 10);
		assert_eq!(result, 1.0);
	}

	#[test]
	fn network_hash_ps_over_chain_zero_at_genesis() {
		use chain::{BlockHeader, HeaderArena};
		use primitives::hash::H256;
		let mut arena = HeaderArena::new();
		let idx = arena.push(
			BlockHeader {
				version: 1,
				previous_header_hash: H256::default(),
				merkle_root_hash: H256::default(),
				time: 1_000,
				bits: Compact::new(0x1e0ffff0),
				nonce: 0,
			},
			None,
			U256::one(),
			U256::zero(),
		);
		let tip = arena.node(idx);
		assert_eq!(network_hash_ps_over_chain(tip, 10), 0.0);
	}

	#[test]
	fn network_hash_ps_over_chain_stable_rate() {
		use chain::{BlockHeader, HeaderArena};
		use primitives::hash::H256;
		let mut arena = HeaderArena::new();
		let mut prev = None;
		for i in 0..30u32 {
			prev = Some(arena.push(
				BlockHeader {
					version: 1,
					previous_header_hash: H256::default(),
					merkle_root_hash: H256::default(),
					time: 1_000 + i * 180,
					bits: Compact::new(0x1e0ffff0),
					nonce: 0,
				},
				prev,
				U256::from(i + 1),
				U256::zero(),
			));
		}
		let tip = arena.node(prev.unwrap());
		let rate = network_hash_ps_over_chain(tip, 10);
		assert!(rate > 0.0);
	}
}
