extern crate rustc_hex;
extern crate uint;
#[cfg(feature = "serde-support")]
extern crate serde;

pub mod bigint;
pub mod compact;
pub mod hash;
