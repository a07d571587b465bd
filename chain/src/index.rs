use primitives::bigint::U256;
use block_header::BlockHeader;
use node::BlockIndexNode;

struct IndexedHeader {
	header: BlockHeader,
	height: i32,
	chain_work: U256,
	pow_hash: U256,
	prev: Option<usize>,
}

/// A minimal, append-only arena standing in for a node's real block index.
///
/// Headers are pushed in chain order; a handle into the arena (`ArenaNode`) is the
/// `BlockIndexNode` implementation the retargeting core walks over. This is test and
/// demonstration scaffolding, not a production index: no reorg support, no pruning.
#[derive(Default)]
pub struct HeaderArena {
	nodes: Vec<IndexedHeader>,
}

impl HeaderArena {
	pub fn new() -> Self {
		HeaderArena { nodes: Vec::new() }
	}

	/// Appends a header as the child of `prev` (or as genesis if `prev` is `None`).
	/// `chain_work` and `pow_hash` are supplied by the caller, since computing them is
	/// the job of the hashing/work-proof layer, not the index itself.
	pub fn push(&mut self, header: BlockHeader, prev: Option<usize>, chain_work: U256, pow_hash: U256) -> usize {
		let height = match prev {
			Some(p) => self.nodes[p].height + 1,
			None => 0,
		};
		self.nodes.push(IndexedHeader { header, height, chain_work, pow_hash, prev });
		self.nodes.len() - 1
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn node(&self, index: usize) -> ArenaNode {
		ArenaNode { arena: self, index }
	}

	pub fn tip(&self) -> Option<ArenaNode> {
		if self.nodes.is_empty() {
			None
		} else {
			Some(self.node(self.nodes.len() - 1))
		}
	}
}

/// A cheap, copyable reference to one arena entry.
#[derive(Clone, Copy)]
pub struct ArenaNode<'a> {
	arena: &'a HeaderArena,
	index: usize,
}

impl<'a> ArenaNode<'a> {
	fn record(&self) -> &'a IndexedHeader {
		&self.arena.nodes[self.index]
	}

	pub fn index(&self) -> usize {
		self.index
	}

	pub fn header(&self) -> &'a BlockHeader {
		&self.record().header
	}
}

impl<'a> BlockIndexNode for ArenaNode<'a> {
	fn height(&self) -> i32 {
		self.record().height
	}

	fn time(&self) -> i64 {
		self.record().header.time as i64
	}

	fn bits(&self) -> ::primitives::compact::Compact {
		self.record().header.bits
	}

	fn chain_work(&self) -> U256 {
		self.record().chain_work
	}

	fn pow_hash(&self) -> U256 {
		self.record().pow_hash
	}

	fn prev(&self) -> Option<Self> {
		self.record().prev.map(|p| self.arena.node(p))
	}
}

#[cfg(test)]
mod tests {
	use primitives::bigint::U256;
	use primitives::compact::Compact;
	use primitives::hash::H256;
	use block_header::BlockHeader;
	use node::BlockIndexNode;
	use super::HeaderArena;

	fn header(time: u32) -> BlockHeader {
		BlockHeader {
			version: 1,
			previous_header_hash: H256::default(),
			merkle_root_hash: H256::default(),
			time,
			bits: Compact::new(0x1e0ffff0),
			nonce: 0,
		}
	}

	#[test]
	fn genesis_has_height_zero() {
		let mut arena = HeaderArena::new();
		let idx = arena.push(header(1_000), None, U256::from(1u32), U256::zero());
		let node = arena.node(idx);
		assert_eq!(node.height(), 0);
		assert!(node.prev().is_none());
	}

	#[test]
	fn chain_links_backwards() {
		let mut arena = HeaderArena::new();
		let genesis = arena.push(header(1_000), None, U256::from(1u32), U256::zero());
		let child = arena.push(header(1_180), Some(genesis), U256::from(2u32), U256::zero());
		let node = arena.node(child);
		assert_eq!(node.height(), 1);
		let parent = node.prev().unwrap();
		assert_eq!(parent.height(), 0);
		assert_eq!(parent.time(), 1_000);
	}

	#[test]
	fn ancestor_walks_back_n_steps() {
		let mut arena = HeaderArena::new();
		let mut prev = None;
		for i in 0..5 {
			prev = Some(arena.push(header(1_000 + i * 180), prev, U256::from(1u32), U256::zero()));
		}
		let tip = arena.tip().unwrap();
		let back = tip.ancestor(4).unwrap();
		assert_eq!(back.height(), 0);
		assert!(tip.ancestor(5).is_none());
	}
}
