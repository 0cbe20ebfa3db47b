//! tracesift core library: per-packet field extraction from packet captures.
//!
//! A capture source yields raw frames, the decoder turns each frame into
//! layered header views (Ethernet -> IPv4 -> TCP/UDP), the extractor maps the
//! view to at most one CSV row plus a counter bucket, and an extraction job
//! drives that loop for a single file. The batch scheduler fans jobs out over
//! many sources with a fixed number of workers.
//!
//! Invariants:
//! - Every frame read increments `total_frames` exactly once and produces at
//!   most one output row.
//! - `total = ip + non_ip4` and `ip = tcp + udp + unprocessed + other_ip`.
//! - Rows are written in capture order.
//! - Per-frame problems never fail a job; only an unreadable capture or a
//!   failing output sink do.
//!
//! # Examples
//! ```no_run
//! use tracesift_core::{ExtractionJob, NoProgress};
//!
//! let result = ExtractionJob::new("trace", "trace.pcap", "trace.csv", 0).run(&NoProgress)?;
//! println!("{} frames, {} tcp", result.total_frames, result.tcp_frames);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

mod batch;
mod extract;
mod protocols;
mod source;

pub use batch::{
    ArchiveFetcher, BatchConfig, BatchScheduler, ConfigError, DEFAULT_WORKERS, FetchError,
    FetchedCapture, Fetcher, HttpFetcher, JobProgress, NoProgress, PlannedJob, ProgressSink,
    SUMMARY_HEADER, SourcesError, SummaryError, TraceSource, load_sources, parse_sources,
    plan_jobs, trace_stem, write_report_json, write_summary, write_summary_file,
};
pub use extract::{
    CSV_HEADER, CsvRecordSink, DecodedFrame, Extraction, ExtractionJob, FrameCounters,
    FrameOutcome, Ipv4Frame, JobError, L4Protocol, NonIpv4, OutputRecord, SinkError, Transport,
    TransportGap, TransportPorts, decode_frame, extract_record,
};
pub use protocols::HeaderError;
pub use source::{
    CaptureTime, FrameReadError, FrameSource, PcapFileSource, RawFrame, SourceError, SourceEvent,
};

/// Final counters of one extraction job.
///
/// `non_ip4_frames` includes `ipv6_frames` and `damaged_frames`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// Job label, the file stem of the trace.
    pub file: String,
    pub total_frames: u64,
    pub ip_frames: u64,
    pub non_ip4_frames: u64,
    pub tcp_frames: u64,
    pub udp_frames: u64,
    /// TCP/UDP frames whose ports could not be extracted.
    pub unprocessed_frames: u64,
    pub other_ip_frames: u64,
    pub ipv6_frames: u64,
    /// Records skipped by the reader because their header was inconsistent.
    pub damaged_frames: u64,
    pub records_written: u64,
    /// The capture ended inside a record; counters cover the frames before it.
    pub truncated: bool,
    /// RFC3339 timestamp of the earliest frame (if any).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_start: Option<String>,
    /// RFC3339 timestamp of the latest frame (if any).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_end: Option<String>,
    pub output: PathBuf,
}

/// Why a job produced no result.
///
/// # Examples
/// ```
/// use tracesift_core::FailureCategory;
///
/// assert_eq!(FailureCategory::OutputSink.to_string(), "output_sink");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Download,
    Decompress,
    Open,
    OutputSink,
    Panicked,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::Download => "download",
            FailureCategory::Decompress => "decompress",
            FailureCategory::Open => "open",
            FailureCategory::OutputSink => "output_sink",
            FailureCategory::Panicked => "panicked",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Completed(JobResult),
    Failed {
        category: FailureCategory,
        detail: String,
    },
}

/// Result for one source of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    /// Position of the source in the input list.
    pub index: usize,
    pub source: TraceSource,
    pub status: JobStatus,
}

/// All outcomes of a batch run, ordered by source index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<JobOutcome>,
}

impl BatchReport {
    pub fn completed(&self) -> impl Iterator<Item = &JobResult> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.status {
            JobStatus::Completed(result) => Some(result),
            JobStatus::Failed { .. } => None,
        })
    }

    /// Failed outcomes as `(source, category)` pairs.
    pub fn failures(&self) -> impl Iterator<Item = (&TraceSource, FailureCategory)> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.status {
            JobStatus::Failed { category, .. } => Some((&outcome.source, *category)),
            JobStatus::Completed(_) => None,
        })
    }

    pub fn succeeded(&self) -> usize {
        self.completed().count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}
