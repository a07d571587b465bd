extern crate primitives;

mod block_header;
mod index;
mod node;

pub use primitives::{bigint, compact, hash};

pub use block_header::BlockHeader;
pub use index::{ArenaNode, HeaderArena};
pub use node::BlockIndexNode;
