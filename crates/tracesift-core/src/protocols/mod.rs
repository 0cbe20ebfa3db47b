//! Header decoders for the layers a trace record needs.
//!
//! Each protocol follows a layered structure:
//! - `layout`: byte offsets and ranges (source of truth)
//! - `parser`: domain-level decoding (no direct byte indexing)
//!
//! Bounds-checked byte access and the shared error type live in `common`.
//! Parsers are pure and contain no I/O; the `extract` layer chains them and
//! decides how a failure at each layer is classified.

pub(crate) mod common;
pub mod ethernet;
pub mod ipv4;
pub mod transport;

pub use common::HeaderError;
