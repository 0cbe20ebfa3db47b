use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::counters::FrameCounters;
use super::decode::decode_frame;
use super::record::extract_record;
use super::sink::{CsvRecordSink, SinkError};
use crate::batch::{JobProgress, ProgressSink};
use crate::source::{FrameSource, PcapFileSource, SourceError, SourceEvent};
use crate::{FailureCategory, JobResult};

/// Frames between two progress notifications.
const PROGRESS_INTERVAL: u64 = 8192;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("cannot open capture {}: {source}", .path.display())]
    Open { path: PathBuf, source: SourceError },
    #[error("cannot write output {}: {source}", .path.display())]
    Output { path: PathBuf, source: SinkError },
}

impl JobError {
    pub fn category(&self) -> FailureCategory {
        match self {
            JobError::Open { .. } => FailureCategory::Open,
            JobError::Output { .. } => FailureCategory::OutputSink,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Opening,
    Streaming,
    Completed,
    Failed,
}

/// One capture file, end to end: read, decode, extract, write, tally.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub index: usize,
    pub label: String,
    pub capture: PathBuf,
    pub output: PathBuf,
    /// Advisory; only feeds progress fractions.
    pub expected_records: u64,
}

impl ExtractionJob {
    pub fn new(
        label: impl Into<String>,
        capture: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        expected_records: u64,
    ) -> Self {
        Self {
            index: 0,
            label: label.into(),
            capture: capture.into(),
            output: output.into(),
            expected_records,
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Open the capture and stream it into the output CSV.
    pub fn run(self, progress: &dyn ProgressSink) -> Result<JobResult, JobError> {
        let mut state = JobState::Opening;
        debug!(job = %self.label, capture = %self.capture.display(), "opening capture");
        let source = match PcapFileSource::open(&self.capture) {
            Ok(source) => source,
            Err(source) => {
                // Nothing written yet; an output left by an earlier run stays.
                self.enter(&mut state, JobState::Failed);
                return Err(JobError::Open {
                    path: self.capture,
                    source,
                });
            }
        };
        self.stream(state, source, progress)
    }

    /// Same as [`run`](Self::run) with an already opened source.
    pub fn run_with_source<S: FrameSource>(
        self,
        source: S,
        progress: &dyn ProgressSink,
    ) -> Result<JobResult, JobError> {
        self.stream(JobState::Opening, source, progress)
    }

    fn stream<S: FrameSource>(
        self,
        mut state: JobState,
        mut source: S,
        progress: &dyn ProgressSink,
    ) -> Result<JobResult, JobError> {
        let mut sink = match CsvRecordSink::create(&self.output) {
            Ok(sink) => sink,
            Err(err) => return Err(self.fail_output(&mut state, err)),
        };
        self.enter(&mut state, JobState::Streaming);

        let mut counters = FrameCounters::default();
        let mut truncated = false;
        loop {
            let event = match source.next_event() {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(err) => {
                    warn!(
                        job = %self.label,
                        frames = counters.total,
                        error = %err,
                        "capture ends early, keeping frames read so far"
                    );
                    truncated = true;
                    break;
                }
            };

            match event {
                SourceEvent::Frame(frame) => {
                    let decoded = decode_frame(frame.linktype, &frame.data);
                    let extraction = extract_record(&frame, &decoded);
                    if let Some(record) = &extraction.record {
                        if let Err(err) = sink.write(record) {
                            return Err(self.fail_output(&mut state, err));
                        }
                    }
                    counters.record(frame.ts, extraction.outcome);
                }
                SourceEvent::Damaged(reason) => {
                    debug!(job = %self.label, frame = counters.total + 1, %reason, "skipping damaged record");
                    counters.record_damaged();
                }
            }

            if counters.total % PROGRESS_INTERVAL == 0 {
                progress.progress(
                    self.index,
                    JobProgress::new(counters.total, self.expected_records),
                );
            }
        }

        let records_written = sink.rows();
        if let Err(err) = sink.finish() {
            return Err(self.fail_output(&mut state, err));
        }
        progress.progress(
            self.index,
            JobProgress::new(counters.total, self.expected_records),
        );
        self.enter(&mut state, JobState::Completed);
        info!(
            job = %self.label,
            frames = counters.total,
            records = records_written,
            truncated,
            "extraction complete"
        );

        Ok(JobResult {
            file: self.label,
            total_frames: counters.total,
            ip_frames: counters.ip,
            non_ip4_frames: counters.non_ip4,
            tcp_frames: counters.tcp,
            udp_frames: counters.udp,
            unprocessed_frames: counters.unprocessed,
            other_ip_frames: counters.other_ip,
            ipv6_frames: counters.ipv6,
            damaged_frames: counters.damaged,
            records_written,
            truncated,
            capture_start: counters.first_ts.and_then(|ts| ts.to_rfc3339()),
            capture_end: counters.last_ts.and_then(|ts| ts.to_rfc3339()),
            output: self.output,
        })
    }

    fn enter(&self, state: &mut JobState, next: JobState) {
        debug!(job = %self.label, from = ?*state, to = ?next, "job state");
        *state = next;
    }

    fn fail_output(&self, state: &mut JobState, source: SinkError) -> JobError {
        self.enter(state, JobState::Failed);
        remove_partial_output(&self.output);
        JobError::Output {
            path: self.output.clone(),
            source,
        }
    }
}

fn remove_partial_output(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed partial output"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "cannot remove partial output"),
    }
}
