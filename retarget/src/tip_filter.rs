use std::cmp::Ordering;
use chain::BlockIndexNode;
use primitives::bigint::U256;
use primitives::compact::Compact;

#[cfg(feature = "serde-support")]
use serde::Serialize;

/// Triangular weighting window sizes for the "fast rising" / "fast falling" tip averages,
/// widened once the second PID hardfork activates.
const WEIGHTED_AVG_TIP_BLOCKS_UP: i32 = 9;
const WEIGHTED_AVG_TIP_BLOCKS_DOWN: i32 = 20;
const WEIGHTED_AVG_TIP_BLOCKS_UP_LEGACY: i32 = 4;
const WEIGHTED_AVG_TIP_BLOCKS_DOWN_LEGACY: i32 = 6;

/// One sample inside the tip filter, ordered by timestamp once the filter is sorted.
///
/// `bits == 0` marks the synthetic point a header-aware filter inserts for the candidate
/// block currently being timed, which has no target of its own yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize))]
pub struct FilterPoint {
	pub time: i64,
	pub bits: u32,
	pub spacing: i32,
	pub spacing_error: i32,
	pub rate_of_change: i32,
}

impl FilterPoint {
	fn new(time: i64, bits: u32) -> Self {
		FilterPoint { time, bits, spacing: 0, spacing_error: 0, rate_of_change: 0 }
	}
}

impl PartialOrd for FilterPoint {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for FilterPoint {
	fn cmp(&self, other: &Self) -> Ordering {
		self.time.cmp(&other.time)
	}
}

/// Sliding window of the most recent `blocks` headers, sorted by time, from which the PID
/// controller derives its spacing-error and rate-of-change inputs and its difficulty-change
/// limiter anchors.
///
/// A "header" variant (`uses_header`) additionally folds in the timestamp of the candidate
/// block currently being validated, so the controller can react to it before it is part of
/// the index; the extra point carries `bits = 0` and is excluded from every weighted average.
#[derive(Debug, Clone)]
pub struct TipFilter {
	pub blocks: i32,
	pub uses_header: bool,

	pub initialized: bool,
	pub index_filter_height: i32,

	pub index_points: Vec<FilterPoint>,
	pub header_points: Vec<FilterPoint>,

	pub prev_diff_calculated: U256,
	pub prev_diff_weight: u32,
	pub prev_diff_for_limits_last: U256,
	pub tip_diff_up: U256,
	pub tip_diff_down: U256,

	pub diff_at_max_increase_last: U256,
	pub diff_at_max_increase_tip: U256,
	pub diff_at_max_decrease_last: U256,
	pub diff_at_max_decrease_tip: U256,

	pub spacing_error: f64,
	pub rate_of_change: f64,
	pub average_tip_spacing: f64,
	pub spacing_error_weight: u32,
	pub rate_change_weight: u32,
}

impl TipFilter {
	pub fn new(blocks: i32, uses_header: bool) -> Self {
		TipFilter {
			blocks,
			uses_header,
			initialized: false,
			index_filter_height: -1,
			index_points: Vec::new(),
			header_points: Vec::new(),
			prev_diff_calculated: U256::zero(),
			prev_diff_weight: 0,
			prev_diff_for_limits_last: U256::zero(),
			tip_diff_up: U256::zero(),
			tip_diff_down: U256::zero(),
			diff_at_max_increase_last: U256::zero(),
			diff_at_max_increase_tip: U256::zero(),
			diff_at_max_decrease_last: U256::zero(),
			diff_at_max_decrease_tip: U256::zero(),
			spacing_error: 0.0,
			rate_of_change: 0.0,
			average_tip_spacing: 0.0,
			spacing_error_weight: 0,
			rate_change_weight: 0,
		}
	}

	/// Rebuilds the index-backed window and its difficulty-limiter anchors for `tip`. A
	/// no-op if the window was already built for this exact height. Returns `false` if
	/// `tip` does not yet have `blocks` ancestors.
	pub fn update_index<T: BlockIndexNode>(
		&mut self,
		tip: T,
		target_spacing: i64,
		hardfork_block_2: i32,
		max_diff_increase: &mut u32,
		max_diff_decrease: &mut u32,
	) -> bool {
		if tip.height() < self.blocks {
			return false;
		}
		if self.initialized && self.index_filter_height == tip.height() {
			return true;
		}

		let mut points = Vec::with_capacity(self.blocks as usize);
		let mut node = tip;
		for i in 0..self.blocks {
			points.push(FilterPoint::new(node.time(), node.bits().into()));
			if i + 1 < self.blocks {
				node = match node.prev() {
					Some(prev) => prev,
					None => return false,
				};
			}
		}
		points.sort();

		let mut acc = U256::zero();
		let mut divider_sum: u32 = 0;
		for (i, point) in points.iter().enumerate() {
			let weight = (i + 1) as u32;
			let (target, _, _) = Compact::new(point.bits).to_u256_lossy();
			acc = acc + target * U256::from(weight);
			divider_sum += weight;
		}
		self.prev_diff_weight = divider_sum;
		self.prev_diff_calculated = acc / U256::from(divider_sum);

		let past_hardfork_2 = tip.height() > hardfork_block_2;
		let up_blocks = if past_hardfork_2 { WEIGHTED_AVG_TIP_BLOCKS_UP } else { WEIGHTED_AVG_TIP_BLOCKS_UP_LEGACY };
		let down_blocks = if past_hardfork_2 { WEIGHTED_AVG_TIP_BLOCKS_DOWN } else { WEIGHTED_AVG_TIP_BLOCKS_DOWN_LEGACY };
		self.tip_diff_up = weighted_tip_average(&points, up_blocks);
		self.tip_diff_down = weighted_tip_average(&points, down_blocks);

		if past_hardfork_2 {
			*max_diff_increase = 150;
			*max_diff_decrease = 130;
		}
		if *max_diff_increase < 101 {
			*max_diff_increase = 101;
		}
		if *max_diff_decrease < 101 {
			*max_diff_decrease = 101;
		}

		let (prev_last, _, _) = tip.bits().to_u256_lossy();
		self.prev_diff_for_limits_last = prev_last;
		self.diff_at_max_increase_last = prev_last * U256::from(100u32) / U256::from(*max_diff_increase);
		self.diff_at_max_increase_tip = self.tip_diff_up * U256::from(100u32) / U256::from(*max_diff_increase);
		self.diff_at_max_decrease_last = prev_last * U256::from(*max_diff_decrease) / U256::from(100u32);
		self.diff_at_max_decrease_tip = self.tip_diff_down * U256::from(*max_diff_decrease) / U256::from(100u32);

		if !self.uses_header {
			let (spacing_error, rate_of_change, average_tip_spacing, spacing_error_weight, rate_change_weight) =
				update_filter_timing_results(&mut points, target_spacing);
			self.spacing_error = spacing_error;
			self.rate_of_change = rate_of_change;
			self.average_tip_spacing = average_tip_spacing;
			self.spacing_error_weight = spacing_error_weight;
			self.rate_change_weight = rate_change_weight;
		}

		self.index_points = points;
		self.index_filter_height = tip.height();
		self.initialized = true;
		true
	}

	/// Folds `header_time` into a copy of the index window (when `uses_header`) and
	/// recomputes the timing-error terms against it. Without `uses_header` this just
	/// reports whether `update_index` has run.
	pub fn calc_block_time_errors(&mut self, header_time: i64, target_spacing: i64) -> bool {
		if !self.initialized {
			return false;
		}
		if !self.uses_header {
			return true;
		}

		let header_point = FilterPoint::new(header_time, 0);
		let mut merged = Vec::with_capacity(self.index_points.len() + 1);
		let mut inserted = false;
		for point in &self.index_points {
			if !inserted && header_time < point.time {
				merged.push(header_point);
				inserted = true;
			}
			merged.push(*point);
		}
		if !inserted {
			merged.push(header_point);
		}

		let (spacing_error, rate_of_change, average_tip_spacing, spacing_error_weight, rate_change_weight) =
			update_filter_timing_results(&mut merged, target_spacing);
		self.spacing_error = spacing_error;
		self.rate_of_change = rate_of_change;
		self.average_tip_spacing = average_tip_spacing;
		self.spacing_error_weight = spacing_error_weight;
		self.rate_change_weight = rate_change_weight;
		self.header_points = merged;
		true
	}

	/// Number of points the filter samples, including the synthetic header point if any.
	pub fn size(&self) -> i32 {
		if self.uses_header {
			self.blocks + 1
		} else {
			self.blocks
		}
	}

	/// The filter currently in effect for reporting: the header-merged window if
	/// `uses_header`, otherwise the plain index window.
	pub fn points(&self) -> &[FilterPoint] {
		if self.uses_header {
			&self.header_points
		} else {
			&self.index_points
		}
	}
}

fn weighted_tip_average(points: &[FilterPoint], weight_blocks: i32) -> U256 {
	let n = points.len() as i32;
	let mut acc = U256::zero();
	let mut divider_sum: u32 = 0;
	let lo = (n - weight_blocks + 1).max(1);
	for i in lo..=n {
		let weight = (i + weight_blocks - n) as u32;
		let (target, _, _) = Compact::new(points[(i - 1) as usize].bits).to_u256_lossy();
		acc = acc + target * U256::from(weight);
		divider_sum += weight;
	}
	acc / U256::from(divider_sum.max(1))
}

/// Computes the weighted spacing error, rate-of-change and average spacing across a sorted
/// run of filter points, writing each intermediate `spacing`/`spacing_error`/`rate_of_change`
/// back into the points themselves the way the legacy per-index fields did.
fn update_filter_timing_results(points: &mut [FilterPoint], target_spacing: i64) -> (f64, f64, f64, u32, u32) {
	let n = points.len();
	let mut spacing_error_sum = 0.0f64;
	let mut rate_of_change_sum = 0.0f64;
	let mut block_spacing_sum: i64 = 0;
	let mut divider_sum: u32 = 0;
	let mut prev_time_error: i32 = 0;

	for i in 1..n {
		let spacing = (points[i].time - points[i - 1].time) as i32;
		points[i].spacing = spacing;
		block_spacing_sum += spacing as i64;

		let time_error = spacing - target_spacing as i32;
		points[i].spacing_error = time_error;

		if i > 1 {
			let change_rate = time_error - prev_time_error;
			points[i].rate_of_change = change_rate;
			rate_of_change_sum += change_rate as f64 * (i - 1) as f64;
		}
		prev_time_error = time_error;

		spacing_error_sum += time_error as f64 * i as f64;
		divider_sum += i as u32;
	}

	let average_tip_spacing = if n > 1 { block_spacing_sum as f64 / (n - 1) as f64 } else { 0.0 };
	let spacing_error_weight = divider_sum;
	let spacing_error = if divider_sum > 0 { spacing_error_sum / divider_sum as f64 } else { 0.0 };
	let rate_change_weight = divider_sum.saturating_sub(n as u32).saturating_add(1);
	let rate_of_change = if rate_change_weight > 0 { rate_of_change_sum / rate_change_weight as f64 } else { 0.0 };

	(spacing_error, rate_of_change, average_tip_spacing, spacing_error_weight, rate_change_weight)
}

#[cfg(test)]
mod tests {
	use chain::{BlockHeader, HeaderArena, BlockIndexNode};
	use primitives::bigint::U256;
	use primitives::compact::Compact;
	use primitives::hash::H256;
	use super::TipFilter;

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

	fn build_uniform_chain(len: u32, bits: Compact, spacing: u32) -> HeaderArena {
		let mut arena = HeaderArena::new();
		let mut prev = None;
		for i in 0..len {
			prev = Some(push(&mut arena, prev, 1_000 + i * spacing, bits));
		}
		arena
	}

	#[test]
	fn below_window_size_fails() {
		let arena = build_uniform_chain(4, Compact::new(0x1e0ffff0), 180);
		let tip = arena.tip().unwrap();
		let mut filter = TipFilter::new(21, false);
		let mut inc = 200u32;
		let mut dec = 170u32;
		assert!(!filter.update_index(tip, 180, 1_125_000, &mut inc, &mut dec));
	}

	#[test]
	fn stable_chain_yields_matching_prev_diff() {
		let bits = Compact::new(0x1e0ffff0);
		let arena = build_uniform_chain(40, bits, 180);
		let tip = arena.tip().unwrap();
		let mut filter = TipFilter::new(21, false);
		let mut inc = 200u32;
		let mut dec = 170u32;
		assert!(filter.update_index(tip, 180, 1_125_000, &mut inc, &mut dec));
		let (expected, _, _) = bits.to_u256_lossy();
		assert_eq!(filter.prev_diff_calculated, expected);
		assert_eq!(filter.tip_diff_up, expected);
		assert_eq!(filter.tip_diff_down, expected);
	}

	#[test]
	fn stable_chain_has_zero_spacing_error() {
		let bits = Compact::new(0x1e0ffff0);
		let arena = build_uniform_chain(40, bits, 180);
		let tip = arena.tip().unwrap();
		let mut filter = TipFilter::new(21, false);
		let mut inc = 200u32;
		let mut dec = 170u32;
		assert!(filter.update_index(tip, 180, 1_125_000, &mut inc, &mut dec));
		assert_eq!(filter.spacing_error, 0.0);
		assert_eq!(filter.rate_of_change, 0.0);
		assert_eq!(filter.average_tip_spacing, 180.0);
	}

	#[test]
	fn repeat_call_at_same_height_is_noop() {
		let bits = Compact::new(0x1e0ffff0);
		let arena = build_uniform_chain(40, bits, 180);
		let tip = arena.tip().unwrap();
		let mut filter = TipFilter::new(21, false);
		let mut inc = 200u32;
		let mut dec = 170u32;
		assert!(filter.update_index(tip, 180, 1_125_000, &mut inc, &mut dec));
		let first = filter.prev_diff_calculated;
		assert!(filter.update_index(tip, 180, 1_125_000, &mut inc, &mut dec));
		assert_eq!(filter.prev_diff_calculated, first);
	}

	#[test]
	fn header_variant_inserts_sentinel_point() {
		let bits = Compact::new(0x1e0ffff0);
		let arena = build_uniform_chain(40, bits, 180);
		let tip = arena.tip().unwrap();
		let mut filter = TipFilter::new(21, true);
		let mut inc = 200u32;
		let mut dec = 170u32;
		assert!(filter.update_index(tip, 180, 1_125_000, &mut inc, &mut dec));
		assert!(filter.calc_block_time_errors(tip.time() + 180, 180));
		assert_eq!(filter.header_points.len(), 22);
		assert_eq!(filter.size(), 22);
	}
}
