use chain::BlockIndexNode;
use network::ConsensusParams;
use primitives::bigint::U256;
use primitives::compact::Compact;
use integrator;
use tip_filter::{FilterPoint, TipFilter};

#[cfg(feature = "serde-support")]
use serde::Serialize;

/// PID constants that replace the configured gains once a block's height passes the second
/// hardfork. The original gains remain in effect (and configurable) below it.
const PID_PROPORTIONAL_GAIN_2: f64 = 1.6;
const PID_INTEGRATOR_TIME_2: i64 = 129_600;
const PID_INTEGRATOR_GAIN_2: f64 = 8.0;
const PID_DERIVATIVE_GAIN_2: f64 = 3.0;

const INTERVAL_FORCE_DIFF_DECREASE_MULTIPLE: i64 = 3;
const INTERVAL2_FORCE_DIFF_DECREASE_MULTIPLE: i64 = 5;
const INTERVAL_FORCE_EXT_DIFF_DECREASE_MULTIPLE: i64 = 10;

/// Fixed, host-supplied knobs that are not part of `retarget_pid_reset`'s live-tunable
/// parameter string: the size and kind of the tip filter, the difficulty-change limits, and
/// the bootstrap difficulty used on slow test networks.
#[derive(Debug, Clone, Copy)]
pub struct PidConfig {
	pub tip_filter_blocks: i32,
	pub uses_header: bool,
	pub max_diff_increase: u32,
	pub max_diff_decrease: u32,
	pub testnet_starting_difficulty: U256,
}

impl PidConfig {
	pub fn new(testnet_starting_difficulty: U256) -> Self {
		PidConfig {
			tip_filter_blocks: 21,
			uses_header: false,
			max_diff_increase: 200,
			max_diff_decrease: 170,
			testnet_starting_difficulty,
		}
	}
}

/// Live state of the PID difficulty controller: the tunable gains, the tip filter and
/// integrator's cached charge, and the most recent output. One instance tracks exactly one
/// chain tip; `retarget_pid_reset` replaces it wholesale when the gains change.
///
/// Does not derive `Debug`: `T` is typically a small `Copy` index handle into an external
/// arena that has no reason to implement it.
#[derive(Clone)]
pub struct PidState<T: BlockIndexNode> {
	pub prop_gain: f64,
	pub integration_time: i64,
	pub integ_gain: f64,
	pub deriv_gain: f64,

	pub config: PidConfig,

	integrator_height: i32,
	charged_to_index: Option<T>,
	last_calculation_time: i64,
	blocks_sampled: u32,
	integrator_charge_time: i64,
	integrator_block_time: f64,

	filter: TipFilter,

	pub proportional_term: f64,
	pub integrator_term: f64,
	pub derivative_term: f64,
	pub pid_output_time: i64,
	pub pid_output_time_raw: f64,
	pub pid_output_limited: bool,
	pub difficulty_limited: bool,
	pub uint_target_before_limits: U256,
	pub uint_target_after_limits: U256,
}

impl<T: BlockIndexNode> PidState<T> {
	pub fn new(prop_gain: f64, integration_time: i64, integ_gain: f64, deriv_gain: f64, config: PidConfig) -> Self {
		let tip_filter_blocks = if config.tip_filter_blocks < 5 { 5 } else { config.tip_filter_blocks };
		let mut config = config;
		config.tip_filter_blocks = tip_filter_blocks;
		PidState {
			prop_gain,
			integration_time,
			integ_gain,
			deriv_gain,
			config,
			integrator_height: -1,
			charged_to_index: None,
			last_calculation_time: 0,
			blocks_sampled: 0,
			integrator_charge_time: 0,
			integrator_block_time: 0.0,
			filter: TipFilter::new(tip_filter_blocks, config.uses_header),
			proportional_term: 0.0,
			integrator_term: 0.0,
			derivative_term: 0.0,
			pid_output_time: 0,
			pid_output_time_raw: 0.0,
			pid_output_limited: false,
			difficulty_limited: false,
			uint_target_before_limits: U256::zero(),
			uint_target_after_limits: U256::zero(),
		}
	}

	pub fn matches_gains(&self, prop_gain: f64, integration_time: i64, integ_gain: f64, deriv_gain: f64) -> bool {
		self.prop_gain == prop_gain
			&& self.integration_time == integration_time
			&& self.integ_gain == integ_gain
			&& self.deriv_gain == deriv_gain
	}

	/// Whether `update_output` needs to re-run: the integrator's, the filter's, and the
	/// last computed header time must all still match `tip`/`header_time`.
	pub fn is_update_required(&self, tip: T, header_time: i64) -> bool {
		self.integrator_height != tip.height()
			|| self.last_calculation_time != header_time
			|| self.filter.index_filter_height != tip.height()
	}

	/// Charges the integrator's block-time estimate from `tip`, memoized by height.
	pub fn charge_integrator(&mut self, tip: T, target_spacing: i64, hardfork_block_2: i32) -> bool {
		if self.integrator_height == tip.height() {
			return true;
		}
		match integrator::charge(tip, self.integration_time, target_spacing, hardfork_block_2) {
			Some(charge) => {
				self.integrator_height = tip.height();
				self.charged_to_index = Some(tip);
				self.blocks_sampled = charge.samples;
				self.integrator_charge_time = charge.charge_time;
				self.integrator_block_time = charge.block_time;
				true
			}
			None => false,
		}
	}

	/// Primes the integrator and tip filter caches for `tip` without running the PID math
	/// itself. Used right after constructing a fresh controller, mirroring how the legacy
	/// reset path warms a new controller's caches before its first real retarget call.
	pub fn prime(&mut self, tip: T, target_spacing: i64, hardfork_block_2: i32) -> bool {
		let charged = self.charge_integrator(tip, target_spacing, hardfork_block_2);
		let filtered = self.update_index_tip_filter(tip, hardfork_block_2, target_spacing);
		charged && filtered
	}

	fn update_index_tip_filter(&mut self, tip: T, hardfork_block_2: i32, target_spacing: i64) -> bool {
		self.filter.update_index(
			tip,
			target_spacing,
			hardfork_block_2,
			&mut self.config.max_diff_increase,
			&mut self.config.max_diff_decrease,
		)
	}

	fn set_block_time_error(&mut self, tip: T, header_time: i64, target_spacing: i64, hardfork_block_2: i32) -> bool {
		if !self.update_index_tip_filter(tip, hardfork_block_2, target_spacing) {
			return false;
		}
		let ok = self.filter.calc_block_time_errors(header_time, target_spacing);
		self.last_calculation_time = header_time;
		ok
	}

	/// Runs the full PID pipeline for `tip`/`header_time` if it hasn't already run for this
	/// exact combination, leaving `uint_target_after_limits` holding the resulting target.
	/// Returns `false` (and clamps the output to `params.pow_limit`) when there isn't enough
	/// history yet to produce a value.
	pub fn update_output(&mut self, tip: T, header_time: i64, params: &ConsensusParams) -> bool {
		if !self.is_update_required(tip, header_time) {
			return true;
		}

		if !self.charge_integrator(tip, params.target_spacing, params.hardfork_block_2)
			|| !self.set_block_time_error(tip, header_time, params.target_spacing, params.hardfork_block_2)
		{
			self.uint_target_after_limits = params.pow_limit;
			return false;
		}

		let (prop_gain, integration_time, integ_gain, deriv_gain) = if tip.height() > params.hardfork_block_2 {
			(PID_PROPORTIONAL_GAIN_2, PID_INTEGRATOR_TIME_2, PID_INTEGRATOR_GAIN_2, PID_DERIVATIVE_GAIN_2)
		} else {
			(self.prop_gain, self.integration_time, self.integ_gain, self.deriv_gain)
		};
		self.prop_gain = prop_gain;
		self.integration_time = integration_time;
		self.integ_gain = integ_gain;
		self.deriv_gain = deriv_gain;

		self.proportional_term = prop_gain * self.filter.spacing_error;
		self.integrator_term = (self.integrator_block_time - params.target_spacing as f64) * integ_gain + params.target_spacing as f64;
		self.derivative_term = deriv_gain * self.filter.rate_of_change;

		let pid_output_time_raw = self.proportional_term + self.integrator_term + self.derivative_term;
		let mut pid_output_time = pid_output_time_raw.round() as i64;
		let pid_output_limited = pid_output_time < 1;
		if pid_output_limited {
			pid_output_time = 1;
		}
		self.pid_output_time = pid_output_time;
		self.pid_output_time_raw = pid_output_time_raw;
		self.pid_output_limited = pid_output_limited;

		self.uint_target_before_limits =
			self.filter.prev_diff_calculated * U256::from(pid_output_time as u32) / U256::from(params.target_spacing as u32);

		let (result, limited) = self.limit_output_difficulty_change(
			self.uint_target_before_limits,
			tip,
			params.pow_limit,
			params.target_spacing,
			params.hardfork_block_2,
		);
		self.uint_target_after_limits = result;
		self.difficulty_limited = limited;

		debug!(
			"pid retarget at height {}: P={:.3} I={:.3} D={:.3} output_time={} target=0x{:08x}",
			tip.height() + 1,
			self.proportional_term,
			self.integrator_term,
			self.derivative_term,
			self.pid_output_time,
			u32::from(Compact::from_u256(self.uint_target_after_limits)),
		);
		if self.pid_output_limited {
			warn!("pid retarget at height {}: output_time clamped to 1", tip.height() + 1);
		}
		if limited {
			warn!("pid retarget at height {}: difficulty-change limiter activated", tip.height() + 1);
		}

		true
	}

	/// Clamps a freshly calculated target against the difficulty-change anchors the tip
	/// filter derived, based on how much time has actually elapsed since the last two
	/// blocks. Mirrors the legacy `LimitOutputDifficultyChange` branch-for-branch: which
	/// anchor wins depends on whether the network is accelerating or decelerating and on
	/// how overdue the next block already is.
	fn limit_output_difficulty_change(
		&self,
		calculated: U256,
		tip: T,
		pow_limit: U256,
		target_spacing: i64,
		hardfork_block_2: i32,
	) -> (U256, bool) {
		let last_block_time = tip.time();
		let prev = tip.prev().expect("tip filter requires tip_filter_blocks >= 5 ancestors");
		let prev2 = prev.prev().expect("tip filter requires tip_filter_blocks >= 5 ancestors");

		let time_since_last_block = self.last_calculation_time - last_block_time;
		let last_block_space = last_block_time - prev.time();
		let last2_block_space = last_block_time - prev2.time();

		let interval_force_diff_decrease = INTERVAL_FORCE_DIFF_DECREASE_MULTIPLE * target_spacing;
		let interval2_force_diff_decrease = INTERVAL2_FORCE_DIFF_DECREASE_MULTIPLE * target_spacing;
		let interval_force_ext_diff_decrease = INTERVAL_FORCE_EXT_DIFF_DECREASE_MULTIPLE * target_spacing;

		let prev_last = self.filter.prev_diff_for_limits_last;
		let increase_tip = self.filter.diff_at_max_increase_tip;
		let decrease_last = self.filter.diff_at_max_decrease_last;
		let decrease_tip = self.filter.diff_at_max_decrease_tip;

		let mut result;
		let mut limited = true;

		if calculated < prev_last {
			if calculated < increase_tip {
				result = increase_tip;
				if last_block_space >= interval_force_diff_decrease {
					result = decrease_last;
				}
			} else {
				result = calculated;
				limited = false;
				if last_block_space >= interval_force_diff_decrease {
					limited = true;
					result = decrease_tip;
					if result > decrease_last {
						result = decrease_last;
					}
				}
			}
		} else if calculated > decrease_last
			&& last_block_space < interval_force_diff_decrease
			&& last2_block_space < interval2_force_diff_decrease
		{
			result = decrease_last;
			if result > decrease_tip && last_block_space < target_spacing {
				result = decrease_tip;
			}
		} else if calculated > decrease_tip && last_block_space < target_spacing {
			result = decrease_tip;
		} else if last_block_space >= interval_force_diff_decrease || last2_block_space >= interval2_force_diff_decrease {
			result = decrease_last;
		} else {
			result = calculated;
			limited = false;
		}

		if result < decrease_tip && time_since_last_block >= interval_force_ext_diff_decrease && prev2.height() > hardfork_block_2 {
			result = decrease_tip;
			limited = true;
		}

		if result > pow_limit {
			result = pow_limit;
			limited = true;
		}

		(result, limited)
	}

	/// Reports the controller's internal state at (or just before) `at_height`, temporarily
	/// re-charging the integrator and tip filter to that height if it differs from where
	/// they are currently charged, then restoring them before returning. Returns `None` if
	/// `at_height` predates the tip filter's minimum window.
	pub fn get_retarget_stats(&mut self, at_height: i32, tip: T, params: &ConsensusParams) -> Option<RetargetStats> {
		let saved_integrator_height = self.integrator_height;
		let saved_charged_to = self.charged_to_index;
		let saved_filter_height = self.filter.index_filter_height;
		let saved_last_calculation_time = self.last_calculation_time;

		let target_node = if at_height <= 0 || at_height > tip.height() {
			Some(tip)
		} else {
			tip.ancestor((tip.height() - at_height) as u32)
		};
		let target_node = target_node?;
		if target_node.height() < self.config.tip_filter_blocks {
			return None;
		}

		let header_time = target_node.time() + params.target_spacing;
		let restore_needed = target_node.height() != saved_integrator_height
			|| target_node.height() != saved_filter_height
			|| header_time != saved_last_calculation_time;

		self.update_output(target_node, header_time, params);

		let stats = RetargetStats {
			prop_gain: self.prop_gain,
			integration_time: self.integration_time,
			integ_gain: self.integ_gain,
			deriv_gain: self.deriv_gain,
			uses_header: self.config.uses_header,
			tip_filter_size: self.filter.size(),
			max_diff_increase: self.config.max_diff_increase,
			max_diff_decrease: self.config.max_diff_decrease,
			prev_diff_weight: self.filter.prev_diff_weight,
			spacing_error_weight: self.filter.spacing_error_weight,
			rate_change_weight: self.filter.rate_change_weight,
			min_time_allowed: target_node.time() + 1,
			last_calculation_time: self.last_calculation_time,
			integrator_height: self.integrator_height,
			blocks_sampled: self.blocks_sampled,
			integrator_charge_time: self.integrator_charge_time,
			integrator_block_time: self.integrator_block_time,
			spacing_error: self.filter.spacing_error,
			rate_of_change: self.filter.rate_of_change,
			proportional_term: self.proportional_term,
			integrator_term: self.integrator_term,
			derivative_term: self.derivative_term,
			pid_output_time: self.pid_output_time_raw,
			prev_diff: self.filter.prev_diff_calculated,
			pid_output_limited: self.pid_output_limited,
			difficulty_limited: self.difficulty_limited,
			target_diff: self.uint_target_after_limits,
			average_tip_spacing: self.filter.average_tip_spacing,
			tip_filter: self.filter.points().to_vec(),
			block_spacing: target_node.time() - prev_time_or(target_node),
			prev_pow_hash: target_node.pow_hash(),
		};

		if restore_needed {
			if let Some(original) = saved_charged_to {
				// Force a full recompute against the saved inputs: the temporary excursion
				// above already overwrote `integrator_height`/`last_calculation_time`.
				self.integrator_height = -1;
				self.filter.index_filter_height = -1;
				self.last_calculation_time = saved_last_calculation_time.wrapping_sub(1);
				self.charged_to_index = Some(original);
				self.update_output(original, saved_last_calculation_time, params);
				debug_assert_eq!(self.integrator_height, saved_integrator_height);
			}
		}

		Some(stats)
	}
}

fn prev_time_or<T: BlockIndexNode>(node: T) -> i64 {
	node.prev().map(|p| p.time()).unwrap_or_else(|| node.time())
}

/// Snapshot of a `PidState`'s parameters and most recent computation, suitable for handing
/// back verbatim to a diagnostics RPC.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde-support", derive(Serialize))]
pub struct RetargetStats {
	pub prop_gain: f64,
	pub integration_time: i64,
	pub integ_gain: f64,
	pub deriv_gain: f64,
	pub uses_header: bool,
	pub tip_filter_size: i32,
	pub max_diff_increase: u32,
	pub max_diff_decrease: u32,
	pub prev_diff_weight: u32,
	pub spacing_error_weight: u32,
	pub rate_change_weight: u32,
	pub min_time_allowed: i64,
	pub last_calculation_time: i64,
	pub integrator_height: i32,
	pub blocks_sampled: u32,
	pub integrator_charge_time: i64,
	pub integrator_block_time: f64,
	pub spacing_error: f64,
	pub rate_of_change: f64,
	pub proportional_term: f64,
	pub integrator_term: f64,
	pub derivative_term: f64,
	pub pid_output_time: f64,
	pub prev_diff: U256,
	pub pid_output_limited: bool,
	pub difficulty_limited: bool,
	pub target_diff: U256,
	pub average_tip_spacing: f64,
	pub tip_filter: Vec<FilterPoint>,
	pub block_spacing: i64,
	pub prev_pow_hash: U256,
}
