use crate::JobOutcome;

/// Snapshot of one running job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobProgress {
    pub processed: u64,
    /// `processed / expected`, clamped to 1.0. `None` when nothing was expected.
    pub fraction: Option<f64>,
}

impl JobProgress {
    pub fn new(processed: u64, expected: u64) -> Self {
        let fraction = (expected > 0).then(|| (processed as f64 / expected as f64).min(1.0));
        Self {
            processed,
            fraction,
        }
    }
}

/// Receives progress notifications from the scheduler and its jobs.
///
/// Calls come from worker tasks and blocking job threads and must return
/// promptly. All methods default to no-ops.
pub trait ProgressSink: Send + Sync {
    fn job_started(&self, _index: usize, _label: &str, _expected_records: u64) {}

    fn progress(&self, _index: usize, _progress: JobProgress) {}

    fn job_finished(&self, _outcome: &JobOutcome) {}
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}
