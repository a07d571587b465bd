//! 256-bit unsigned integer used throughout the retargeting core.
//!
//! Built on top of `uint`'s `construct_uint!` rather than the `bigint` crate the rest of
//! this workspace's lineage historically used: `bigint` has been unmaintained for a long
//! time and `uint` gives the same fixed-width little-endian-limb representation with an
//! actively maintained, documented API.

use uint::construct_uint;

#[cfg(feature = "serde-support")]
use serde::{Serialize, Serializer};

construct_uint! {
	pub struct U256(4);
}

/// `uint` carries no `serde` feature of its own, unlike the rest of this crate's types, so
/// the impl is hand-written here rather than forwarded. Hex matches how targets and chain
/// work are displayed and compared elsewhere in this workspace.
#[cfg(feature = "serde-support")]
impl Serialize for U256 {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&format!("{:x}", self))
	}
}

impl U256 {
	/// Lossy conversion to `f64`, used only for diagnostic work-proof figures.
	pub fn to_f64(&self) -> f64 {
		let mut result = 0f64;
		for word in self.0.iter().rev() {
			result = result * 18_446_744_073_709_551_616f64 /* 2^64 */ + *word as f64;
		}
		result
	}

	/// Number of bits required to represent the value (0 for zero).
	pub fn bit_length(&self) -> u32 {
		for (index, word) in self.0.iter().enumerate().rev() {
			if *word != 0 {
				return (index as u32) * 64 + (64 - word.leading_zeros());
			}
		}
		0
	}
}
