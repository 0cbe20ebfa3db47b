//! Capture sources.
//!
//! A source is a single forward cursor over a capture. It yields raw frames
//! (or damaged-record markers) until the capture is exhausted, and keeps
//! failures that abort the whole capture (`SourceError`) apart from
//! per-record damage (`FrameReadError`).

mod pcap;
mod timestamp;

pub use pcap::PcapFileSource;
pub use timestamp::CaptureTime;

use pcap_parser::Linktype;
use thiserror::Error;

/// One captured frame, owned so it can outlive the reader's buffer.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub ts: CaptureTime,
    pub linktype: Linktype,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum SourceEvent {
    Frame(RawFrame),
    /// A record whose header is inconsistent but whose boundary was known;
    /// the reader has already moved past it.
    Damaged(FrameReadError),
}

pub trait FrameSource {
    /// Next event, `Ok(None)` at end of stream.
    ///
    /// After an `Err` the source is exhausted and keeps returning `Ok(None)`.
    fn next_event(&mut self) -> Result<Option<SourceEvent>, SourceError>;
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PCAP parse error: {0}")]
    Pcap(String),
    #[error("capture truncated: {0}")]
    Truncated(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameReadError {
    #[error("captured length {caplen} exceeds original length {origlen}")]
    LengthMismatch { caplen: u32, origlen: u32 },
    #[error("captured length {caplen} exceeds snap length {snaplen}")]
    BeyondSnaplen { caplen: u32, snaplen: u32 },
}

impl From<pcap::error::PcapSourceError> for SourceError {
    fn from(value: pcap::error::PcapSourceError) -> Self {
        match value {
            pcap::error::PcapSourceError::Io(err) => SourceError::Io(err),
            pcap::error::PcapSourceError::Pcap { context, message } => {
                SourceError::Pcap(format!("{context}: {message}"))
            }
            pcap::error::PcapSourceError::Truncated { context, message } => {
                SourceError::Truncated(format!("{context}: {message}"))
            }
        }
    }
}
