//! TCP and UDP header decoding.
//!
//! Only the fields a trace record needs are read: both ports and the header
//! length. UDP headers are a fixed 8 bytes; TCP header length comes from the
//! data-offset field and must be at least 5 words.

pub mod layout;
pub mod parser;

pub use parser::{TransportHeader, parse_tcp, parse_udp};
