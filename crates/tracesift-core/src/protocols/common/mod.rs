pub(crate) mod error;
pub(crate) mod reader;

pub use error::HeaderError;
pub(crate) use reader::ByteReader;
