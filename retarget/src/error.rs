#[derive(Debug, PartialEq)]
/// All possible retargeting errors.
pub enum Error {
	/// The compact target decodes to a negative or overflowing value.
	InvalidTargetEncoding,
	/// The decoded target is zero or exceeds the network's minimum-difficulty limit.
	TargetOutOfRange,
	/// Not enough ancestor blocks are available to run the requested algorithm.
	InsufficientHistory,
	/// `retarget_pid_reset`'s parameter string did not parse as four whitespace-separated
	/// numbers.
	ConfigParseFailed,
}
