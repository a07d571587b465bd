use chain::BlockIndexNode;

/// Anti-windup clamp on the integrator's charged block time, in seconds.
const DMININTEGRATOR: f64 = 170.0;
const DMAXINTEGRATOR: f64 = 190.0;
const DMININTEGRATOR2: f64 = 176.0;
const DMAXINTEGRATOR2: f64 = 195.0;

/// Result of walking the integration window back from a tip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Charge {
	pub samples: u32,
	pub charge_time: i64,
	pub block_time: f64,
}

/// Walks back from `tip` until the integration window (`integration_time` seconds) is
/// covered, averaging the observed spacing and clamping it to the anti-windup bounds so a
/// burst of unusually fast or slow blocks cannot push the integral term out of range.
///
/// `integration_time == 0` disables the integrator: the controller should treat every
/// block as if it arrived exactly on schedule. Returns `None` if `tip` has no parent.
pub fn charge<T: BlockIndexNode>(tip: T, integration_time: i64, target_spacing: i64, hardfork_block_2: i32) -> Option<Charge> {
	if tip.prev().is_none() {
		return None;
	}
	if integration_time == 0 {
		return Some(Charge { samples: 0, charge_time: 0, block_time: target_spacing as f64 });
	}

	let most_recent_time = tip.time();
	let oldest_time = most_recent_time - integration_time;

	let mut node = tip;
	let mut samples: u32 = 1;
	loop {
		node = match node.prev() {
			Some(prev) => prev,
			None => break,
		};
		samples += 1;
		match node.prev() {
			Some(grandparent) if oldest_time < grandparent.time() => continue,
			_ => break,
		}
	}

	let charge_time = most_recent_time - node.time();
	let mut block_time = charge_time as f64 / (samples - 1) as f64;
	if tip.height() <= hardfork_block_2 {
		if block_time < DMININTEGRATOR {
			block_time = DMININTEGRATOR;
		} else if block_time > DMAXINTEGRATOR {
			block_time = DMAXINTEGRATOR;
		}
	} else if block_time < DMININTEGRATOR2 {
		block_time = DMININTEGRATOR2;
	} else if block_time > DMAXINTEGRATOR2 {
		block_time = DMAXINTEGRATOR2;
	}

	Some(Charge { samples, charge_time, block_time })
}

/// Estimates how many blocks a fresh integrator charge from `tip` would sample, without
/// mutating any cached state. Used to report an expected sample size before the controller
/// has actually run at this height; falls back to a flat `integration_time / target_spacing`
/// estimate when there isn't enough history to walk at all.
pub fn calc_block_index_required<T: BlockIndexNode>(tip: Option<T>, integration_time: i64, target_spacing: i64) -> u32 {
	let tip = match tip {
		Some(tip) if tip.prev().is_some() => tip,
		_ => return (integration_time / target_spacing.max(1)).max(0) as u32,
	};

	let oldest_time = tip.time() - integration_time;
	let mut node = tip;
	let mut samples: u32 = 1;
	loop {
		node = match node.prev() {
			Some(prev) => prev,
			None => break,
		};
		samples += 1;
		match node.prev() {
			Some(grandparent) if oldest_time < grandparent.time() => continue,
			_ => break,
		}
	}
	samples
}

#[cfg(test)]
mod tests {
	use chain::{BlockHeader, HeaderArena, BlockIndexNode};
	use primitives::bigint::U256;
	use primitives::compact::Compact;
	use primitives::hash::H256;
	use super::{charge, calc_block_index_required};

	fn push(arena: &mut HeaderArena, prev: Option<usize>, time: u32) -> usize {
		arena.push(
			BlockHeader {
				version: 1,
				previous_header_hash: H256::default(),
				merkle_root_hash: H256::default(),
				time,
				bits: Compact::new(0x1e0ffff0),
				nonce: 0,
			},
			prev,
			U256::zero(),
			U256::zero(),
		)
	}

	#[test]
	fn zero_integration_time_bypasses_walk() {
		let mut arena = HeaderArena::new();
		let a = push(&mut arena, None, 1_000);
		let b = push(&mut arena, Some(a), 1_180);
		let tip = arena.node(b);
		let result = charge(tip, 0, 180, 1_125_000).unwrap();
		assert_eq!(result.samples, 0);
		assert_eq!(result.block_time, 180.0);
	}

	#[test]
	fn no_parent_returns_none() {
		let mut arena = HeaderArena::new();
		let a = push(&mut arena, None, 1_000);
		let tip = arena.node(a);
		assert!(charge(tip, 86400, 180, 1_125_000).is_none());
	}

	#[test]
	fn stable_chain_charges_to_target_spacing() {
		let mut arena = HeaderArena::new();
		let mut prev = None;
		for i in 0..50u32 {
			prev = Some(push(&mut arena, prev, 1_000 + i * 180));
		}
		let tip = arena.node(prev.unwrap());
		let result = charge(tip, 3600, 180, 1_125_000).unwrap();
		assert!((result.block_time - 180.0).abs() < 1e-9);
		assert!(result.samples >= 2);
	}

	#[test]
	fn fast_chain_is_clamped_to_minimum_integrator_bound() {
		let mut arena = HeaderArena::new();
		let mut prev = None;
		for i in 0..50u32 {
			prev = Some(push(&mut arena, prev, 1_000 + i * 10));
		}
		let tip = arena.node(prev.unwrap());
		let result = charge(tip, 3600, 180, 1_125_000).unwrap();
		assert_eq!(result.block_time, 170.0);
	}

	#[test]
	fn post_hardfork_clamp_uses_tighter_bounds() {
		let mut arena = HeaderArena::new();
		let mut prev = None;
		for i in 0..50u32 {
			prev = Some(push(&mut arena, prev, 1_000 + i * 10));
		}
		let tip = arena.node(prev.unwrap());
		let result = charge(tip, 3600, 180, 0).unwrap();
		assert_eq!(result.block_time, 176.0);
	}

	#[test]
	fn calc_block_index_required_without_tip_estimates_flat() {
		assert_eq!(calc_block_index_required::<tests_helper::Dummy>(None, 3600, 180), 20);
	}

	mod tests_helper {
		use chain::BlockIndexNode;
		use primitives::bigint::U256;
		use primitives::compact::Compact;

		#[derive(Clone, Copy)]
		pub struct Dummy;
		impl BlockIndexNode for Dummy {
			fn height(&self) -> i32 { 0 }
			fn time(&self) -> i64 { 0 }
			fn bits(&self) -> Compact { Compact::new(0) }
			fn chain_work(&self) -> U256 { U256::zero() }
			fn pow_hash(&self) -> U256 { U256::zero() }
			fn prev(&self) -> Option<Self> { None }
		}
	}
}
