use chain::BlockIndexNode;
use primitives::bigint::U256;
use primitives::compact::Compact;
use kgw_curve::KGW_BLOCKMASS_CURVE;

/// Classic "Kimoto Gravity Well" retarget. The running difficulty average is computed with
/// plain unsigned subtraction exactly as the original did: when a sampled target is smaller
/// than the running average, the subtraction wraps modulo 2^256 rather than going negative,
/// which is a known quirk of this algorithm's first revision. It is preserved here verbatim
/// rather than "fixed" with the signed-safe formulation KGW-v2 introduced, since fixing it
/// would change historical retarget outputs.
pub fn kgw_v1<T: BlockIndexNode>(
	tip: T,
	target_spacing: i64,
	past_blocks_min: u32,
	past_blocks_max: u32,
	pow_limit: U256,
) -> Compact {
	if tip.height() == 0 || (tip.height() as u32) < past_blocks_min {
		return Compact::from_u256(pow_limit);
	}

	let last_time = tip.time();
	let mut avg = U256::zero();
	let mut block_mass: u32 = 1;
	let mut node = tip;
	let mut actual_rate_secs: u64 = 0;
	let mut target_rate_secs: u64 = 0;

	while block_mass <= past_blocks_max && node.height() > 0 {
		let (sample, _, _) = node.bits().to_u256_lossy();
		if block_mass == 1 {
			avg = sample;
		} else {
			avg = ((sample.overflowing_sub(avg).0) / U256::from(block_mass)).overflowing_add(avg).0;
		}

		// Matches the legacy implicit signed-to-unsigned cast: a non-monotone block time
		// wraps rather than clamping to zero.
		actual_rate_secs = (last_time - node.time()) as u64;
		target_rate_secs = target_spacing as u64 * block_mass as u64;

		let ratio = if actual_rate_secs != 0 && target_rate_secs != 0 {
			target_rate_secs as f64 / actual_rate_secs as f64
		} else {
			1.0
		};
		let eh_fast = 1.0 + 0.7084 * (block_mass as f64 / 144.0).powf(-1.228);
		let eh_slow = 1.0 / eh_fast;

		if block_mass >= past_blocks_min && (ratio <= eh_slow || ratio >= eh_fast) {
			break;
		}

		match node.prev() {
			Some(prev) => {
				node = prev;
				block_mass += 1;
			}
			None => break,
		}
	}

	let mut result = avg;
	if actual_rate_secs != 0 && target_rate_secs != 0 {
		result = result * U256::from(actual_rate_secs);
		result = result / U256::from(target_rate_secs);
	}
	if result > pow_limit {
		result = pow_limit;
	}
	Compact::from_u256(result)
}

/// Fast lookup-table revision of the gravity well retarget. Reformulates the running
/// average with explicit sign tracking so the 256-bit accumulator never wraps, and looks
/// up the event-horizon-fast deviation from a precomputed curve instead of calling `pow()`.
///
/// `target_rate_secs` is incremented *before* the ratio comparison on every iteration,
/// including the first. This reproduces a documented off-by-one quirk from the original:
/// correcting the ordering would change the sampled ratio and therefore the retarget
/// outputs for the historical chain, so it must not be "fixed".
pub fn kgw_v2<T: BlockIndexNode>(
	tip: T,
	target_spacing: i64,
	min_blocks_to_avg: u32,
	max_blocks_to_avg: u32,
	pow_limit: U256,
) -> Compact {
	let mut actual_rate_secs: u32 = 0;
	let mut target_rate_secs: u32 = 0;
	// Matches the legacy default: if the loop below never runs, the all-ones value clamps
	// down to `pow_limit` at the end, exactly as returning `pow_limit` directly would.
	let mut avg = !U256::zero();

	if (tip.height() as u32) >= min_blocks_to_avg {
		let mut block_mass: u32 = 1;
		let mut node = tip;
		let last_time = tip.time();

		while block_mass <= max_blocks_to_avg && node.height() > 0 {
			let (sample, _, _) = node.bits().to_u256_lossy();
			if block_mass == 1 {
				avg = sample;
			} else {
				let negative = sample < avg;
				let mut diff = if negative {
					avg.overflowing_sub(sample).0
				} else {
					sample.overflowing_sub(avg).0
				};
				diff = diff / U256::from(block_mass);
				avg = if negative {
					avg.overflowing_sub(diff).0
				} else {
					avg.overflowing_add(diff).0
				};
			}

			actual_rate_secs = (last_time - node.time()).unsigned_abs() as u32;
			target_rate_secs = target_rate_secs.wrapping_add(target_spacing as u32);
			let ratio = if actual_rate_secs != 0 {
				target_rate_secs as f64 / actual_rate_secs as f64
			} else {
				1.0
			};
			let eh_fast = KGW_BLOCKMASS_CURVE[(block_mass - 1) as usize];
			let eh_slow = 1.0 / eh_fast;

			if block_mass >= min_blocks_to_avg && (ratio <= eh_slow || ratio >= eh_fast) {
				break;
			}

			match node.prev() {
				Some(prev) => {
					node = prev;
					block_mass += 1;
				}
				None => break,
			}
		}
	}

	let mut result = avg;
	if actual_rate_secs != 0 && target_rate_secs != 0 {
		result = result * U256::from(actual_rate_secs);
		result = result / U256::from(target_rate_secs);
	}
	if result > pow_limit {
		result = pow_limit;
	}
	Compact::from_u256(result)
}

#[cfg(test)]
mod tests {
	use chain::{BlockHeader, HeaderArena, BlockIndexNode};
	use primitives::bigint::U256;
	use primitives::compact::Compact;
	use primitives::hash::H256;
	use super::{kgw_v1, kgw_v2};

	fn pow_limit() -> U256 {
		U256::max_value() >> 20
	}

	fn build_uniform_chain(len: u32, bits: Compact, spacing: u32) -> HeaderArena {
		let mut arena = HeaderArena::new();
		let mut prev = None;
		for i in 0..len {
			prev = Some(arena.push(
				BlockHeader {
					version: 1,
					previous_header_hash: H256::default(),
					merkle_root_hash: H256::default(),
					time: 1_000 + i * spacing,
					bits,
					nonce: 0,
				},
				prev,
				U256::zero(),
				U256::zero(),
			));
		}
		arena
	}

	#[test]
	fn kgw_v1_below_min_returns_pow_limit() {
		let arena = build_uniform_chain(10, Compact::new(0x1e0ffff0), 180);
		let tip = arena.tip().unwrap();
		let result = kgw_v1(tip, 180, 120, 3360, pow_limit());
		assert_eq!(result, Compact::from_u256(pow_limit()));
	}

	#[test]
	fn kgw_v2_below_min_returns_pow_limit() {
		let arena = build_uniform_chain(10, Compact::new(0x1e0ffff0), 180);
		let tip = arena.tip().unwrap();
		let result = kgw_v2(tip, 180, 120, 3360, pow_limit());
		assert_eq!(result, Compact::from_u256(pow_limit()));
	}

	#[test]
	fn kgw_v2_stable_chain_reproduces_same_difficulty() {
		let bits = Compact::new(0x1e0ffff0);
		let arena = build_uniform_chain(3400, bits, 180);
		let tip = arena.tip().unwrap();
		let result = kgw_v2(tip, 180, 120, 3360, pow_limit());
		assert_eq!(result, bits);
	}

	#[test]
	fn kgw_v1_never_exceeds_pow_limit() {
		let bits = Compact::from_u256(pow_limit());
		let arena = build_uniform_chain(200, bits, 180);
		let tip = arena.tip().unwrap();
		let result = kgw_v1(tip, 180, 120, 3360, pow_limit());
		let value = result.to_u256_lossy().0;
		assert!(value <= pow_limit());
	}
}
