use std::{fmt, str};
use rustc_hex::{FromHex, ToHex};

/// A 256-bit hash, stored internally in the same byte order it is serialized in.
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct H256([u8; 32]);

impl H256 {
	pub fn from_slice(s: &[u8]) -> Self {
		let mut result = [0u8; 32];
		result.copy_from_slice(s);
		H256(result)
	}

	/// Byte-reversed copy; block hashes are conventionally displayed and compared against
	/// targets in reversed byte order relative to their wire encoding.
	pub fn reversed(&self) -> Self {
		let mut result = self.0;
		result.reverse();
		H256(result)
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}

	pub fn is_zero(&self) -> bool {
		self.0.iter().all(|b| *b == 0)
	}
}

impl From<[u8; 32]> for H256 {
	fn from(bytes: [u8; 32]) -> Self {
		H256(bytes)
	}
}

impl<'a> From<&'a [u8]> for H256 {
	fn from(bytes: &'a [u8]) -> Self {
		H256::from_slice(bytes)
	}
}

impl From<u64> for H256 {
	fn from(v: u64) -> Self {
		let mut result = [0u8; 32];
		result[..8].copy_from_slice(&v.to_le_bytes());
		H256(result)
	}
}

impl fmt::Debug for H256 {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0.to_hex::<String>())
	}
}

impl fmt::Display for H256 {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.0.to_hex::<String>())
	}
}

impl str::FromStr for H256 {
	type Err = rustc_hex::FromHexError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let bytes: Vec<u8> = s.from_hex()?;
		Ok(H256::from_slice(&bytes))
	}
}

#[cfg(test)]
mod tests {
	use super::H256;

	#[test]
	fn reversed_is_involutive() {
		let h = H256::from([1u8; 32]);
		assert_eq!(h.reversed().reversed(), h);
	}

	#[test]
	fn zero_detection() {
		assert!(H256::default().is_zero());
		assert!(!H256::from([1u8; 32]).is_zero());
	}
}
