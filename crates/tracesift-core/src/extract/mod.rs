//! Per-capture extraction.
//!
//! Frames flow `decode -> record -> sink` one at a time; per-frame anomalies
//! end up in `FrameCounters` and never abort the job. Only an unreadable
//! capture or a failing output sink is fatal.

pub mod counters;
pub mod decode;
pub mod job;
pub mod record;
pub mod sink;

pub use counters::FrameCounters;
pub use decode::{
    DecodedFrame, Ipv4Frame, L4Protocol, NonIpv4, Transport, TransportGap, TransportPorts,
    decode_frame,
};
pub use job::{ExtractionJob, JobError};
pub use record::{CSV_HEADER, Extraction, FrameOutcome, OutputRecord, extract_record};
pub use sink::{CsvRecordSink, SinkError};
