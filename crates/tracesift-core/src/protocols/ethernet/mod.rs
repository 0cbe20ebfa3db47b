//! Ethernet II decoding.
//!
//! Only the fixed 14-byte header is read. 802.1Q tags are not unwrapped: a
//! tagged frame reports the tag's EtherType and is classified upstream.

pub mod layout;
pub mod parser;

pub use parser::parse_ethernet;
