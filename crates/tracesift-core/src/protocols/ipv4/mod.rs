//! IPv4 header decoding.
//!
//! The parser requires the 20 fixed header bytes and validates the version
//! and IHL fields. Options are skipped, not decoded. When the IHL-declared
//! header runs past the captured bytes the header is still returned, and
//! `payload()` reports that no transport bytes are available.

pub mod layout;
pub mod parser;

pub use parser::{Ipv4Header, parse_ipv4};
