use thiserror::Error;

/// Errors returned by the header decoders.
///
/// Note: this error type lives in an internal module; the example is
/// illustrative and not compiled as a public doctest.
///
/// # Examples
/// ```text
/// use tracesift_core::HeaderError;
///
/// let err = HeaderError::TooShort { needed: 20, actual: 12 };
/// assert!(err.to_string().contains("need 20 bytes"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("header too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("unexpected IP version {version}")]
    InvalidVersion { version: u8 },
    #[error("invalid IPv4 header length: {ihl} words")]
    InvalidHeaderLength { ihl: u8 },
    #[error("invalid TCP data offset: {offset} words")]
    InvalidDataOffset { offset: u8 },
}
