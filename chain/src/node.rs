use primitives::bigint::U256;
use primitives::compact::Compact;

/// Borrowed view onto one entry of an external block index.
///
/// The retargeting core never owns chain state; it walks backwards through whatever
/// collaborator implements this trait. Implementors are expected to be small, `Copy`
/// handles (an index into an arena, a database cursor position, ...) rather than owned
/// header data, so that walking back a few thousand blocks does not allocate.
pub trait BlockIndexNode: Copy {
	/// Height of this block, genesis = 0.
	fn height(&self) -> i32;
	/// Block timestamp, unix seconds.
	fn time(&self) -> i64;
	/// Compact-encoded target this block was mined against.
	fn bits(&self) -> Compact;
	/// Cumulative chain work up to and including this block.
	fn chain_work(&self) -> U256;
	/// This block's hash, interpreted as a 256-bit integer for target comparisons.
	fn pow_hash(&self) -> U256;
	/// The parent of this block, or `None` at genesis.
	fn prev(&self) -> Option<Self>;

	/// Walks back `n` blocks, returning `None` if the chain is not that long.
	fn ancestor(&self, n: u32) -> Option<Self> {
		let mut node = *self;
		for _ in 0..n {
			node = node.prev()?;
		}
		Some(node)
	}
}
