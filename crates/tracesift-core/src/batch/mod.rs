//! Batch scheduling.
//!
//! Sources are planned up front (unique capture and output paths per
//! source), queued in order, and drained by a fixed set of worker tasks.
//! Each job fetches its capture, then runs extraction on the blocking pool.
//! A failing job becomes a `Failed` outcome for its source; siblings are not
//! affected.

mod config;
mod fetch;
mod http;
mod progress;
mod sources;
mod summary;

pub use config::{BatchConfig, ConfigError, DEFAULT_WORKERS};
pub use fetch::{ArchiveFetcher, FetchError, FetchedCapture, Fetcher};
pub use http::HttpFetcher;
pub use progress::{JobProgress, NoProgress, ProgressSink};
pub use sources::{SourcesError, TraceSource, load_sources, parse_sources};
pub use summary::{
    SUMMARY_HEADER, SummaryError, write_report_json, write_summary, write_summary_file,
};

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::extract::ExtractionJob;
use crate::{BatchReport, FailureCategory, JobOutcome, JobStatus};

/// A source with its paths decided.
#[derive(Debug, Clone)]
pub struct PlannedJob {
    pub index: usize,
    pub source: TraceSource,
    pub stem: String,
    pub capture: PathBuf,
    pub output: PathBuf,
}

/// Runs extraction jobs over many sources with at most `workers` in flight.
pub struct BatchScheduler {
    config: Arc<BatchConfig>,
    fetcher: Arc<dyn Fetcher>,
    progress: Arc<dyn ProgressSink>,
}

impl BatchScheduler {
    pub fn new<F: Fetcher + 'static>(config: BatchConfig, fetcher: F) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            fetcher: Arc::new(fetcher),
            progress: Arc::new(NoProgress),
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Process every source and return one outcome per source, in source
    /// order. Completion order is not preserved.
    pub async fn run(&self, sources: Vec<TraceSource>) -> BatchReport {
        let plan = plan_jobs(&self.config, sources);
        if plan.is_empty() {
            return BatchReport::default();
        }
        let jobs = plan.len();
        let workers = self.config.workers.min(jobs);
        info!(jobs, workers, "starting batch");

        let (queue_tx, queue_rx) = mpsc::channel(jobs);
        for job in plan {
            // Capacity equals the job count, so this never waits.
            if queue_tx.send(job).await.is_err() {
                break;
            }
        }
        drop(queue_tx);

        let queue = Arc::new(Mutex::new(queue_rx));
        let (results_tx, mut results_rx) = mpsc::channel(jobs);
        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let shared = Shared {
                config: Arc::clone(&self.config),
                fetcher: Arc::clone(&self.fetcher),
                progress: Arc::clone(&self.progress),
            };
            handles.push(tokio::spawn(worker_loop(
                worker,
                Arc::clone(&queue),
                shared,
                results_tx.clone(),
            )));
        }
        drop(results_tx);

        let mut outcomes = Vec::with_capacity(jobs);
        while let Some(outcome) = results_rx.recv().await {
            outcomes.push(outcome);
        }
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "worker task ended abnormally");
            }
        }

        outcomes.sort_by_key(|outcome: &JobOutcome| outcome.index);
        let report = BatchReport { outcomes };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "batch finished"
        );
        report
    }
}

#[derive(Clone)]
struct Shared {
    config: Arc<BatchConfig>,
    fetcher: Arc<dyn Fetcher>,
    progress: Arc<dyn ProgressSink>,
}

async fn worker_loop(
    worker: usize,
    queue: Arc<Mutex<mpsc::Receiver<PlannedJob>>>,
    shared: Shared,
    results: mpsc::Sender<JobOutcome>,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(job) = next else {
            break;
        };
        debug!(worker, job = %job.stem, "job picked up");

        let index = job.index;
        let source = job.source.clone();
        // Own task so a panic anywhere in fetch or extract stays with this job.
        let status = match tokio::spawn(execute(shared.clone(), job)).await {
            Ok(status) => status,
            Err(err) => JobStatus::Failed {
                category: FailureCategory::Panicked,
                detail: err.to_string(),
            },
        };
        if let JobStatus::Failed { category, detail } = &status {
            warn!(worker, source = %source.url, %category, %detail, "job failed");
        }

        let outcome = JobOutcome {
            index,
            source,
            status,
        };
        shared.progress.job_finished(&outcome);
        if results.send(outcome).await.is_err() {
            break;
        }
    }
    debug!(worker, "worker idle, queue drained");
}

async fn execute(shared: Shared, job: PlannedJob) -> JobStatus {
    shared
        .progress
        .job_started(job.index, &job.stem, job.source.expected_records);

    let fetched = match shared.fetcher.fetch(&job.source, &job.capture).await {
        Ok(fetched) => fetched,
        Err(err) => {
            return JobStatus::Failed {
                category: err.category(),
                detail: err.to_string(),
            };
        }
    };

    let extraction = ExtractionJob::new(
        job.stem,
        fetched.path.clone(),
        job.output,
        job.source.expected_records,
    )
    .with_index(job.index);
    let progress = Arc::clone(&shared.progress);
    let joined = tokio::task::spawn_blocking(move || extraction.run(progress.as_ref())).await;

    if fetched.owned && !shared.config.keep_captures {
        if let Err(err) = fs::remove_file(&fetched.path) {
            warn!(path = %fetched.path.display(), error = %err, "cannot remove fetched capture");
        }
    }

    match joined {
        Ok(Ok(result)) => JobStatus::Completed(result),
        Ok(Err(err)) => JobStatus::Failed {
            category: err.category(),
            detail: err.to_string(),
        },
        Err(err) => JobStatus::Failed {
            category: FailureCategory::Panicked,
            detail: err.to_string(),
        },
    }
}

/// Assign each source its capture and output paths.
///
/// Stems come from the URL basename; a stem already taken gets the source
/// index appended, so no two jobs share a path.
pub fn plan_jobs(config: &BatchConfig, sources: Vec<TraceSource>) -> Vec<PlannedJob> {
    let mut taken = HashSet::new();
    sources
        .into_iter()
        .enumerate()
        .map(|(index, source)| {
            let base = trace_stem(&source.url);
            let mut stem = base.clone();
            while !taken.insert(stem.clone()) {
                stem = format!("{stem}-{index}");
            }
            PlannedJob {
                index,
                capture: config.work_dir.join(format!("{stem}.pcap")),
                output: config.output_dir.join(format!("{stem}.csv")),
                stem,
                source,
            }
        })
        .collect()
}

/// File stem for a source URL.
///
/// ```text
/// https://host/dir/trace-0042.pcap.gz?sig=1 -> trace-0042
/// equinix.dirA.20160121.UTC.anon.pcap.gz    -> equinix.dirA.20160121.UTC.anon
/// https://host/dir/                         -> trace
/// ```
pub fn trace_stem(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let name = name.strip_suffix(".gz").unwrap_or(name);
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    if stem.is_empty() {
        "trace".to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{BatchConfig, TraceSource, plan_jobs, trace_stem};

    #[test]
    fn stems_from_urls() {
        assert_eq!(trace_stem("https://h/d/trace-0042.pcap.gz?sig=1"), "trace-0042");
        assert_eq!(
            trace_stem("equinix.dirA.20160121.UTC.anon.pcap.gz"),
            "equinix.dirA.20160121.UTC.anon"
        );
        assert_eq!(trace_stem("file:///tmp/raw"), "raw");
        assert_eq!(trace_stem("https://h/d/"), "trace");
        assert_eq!(trace_stem(".pcap"), ".pcap");
    }

    #[test]
    fn duplicate_stems_get_index_suffix() {
        let config = BatchConfig::new("/work", "/out");
        let plan = plan_jobs(
            &config,
            vec![
                TraceSource::new("https://a/x.pcap.gz", 0),
                TraceSource::new("https://b/x.pcap.gz", 0),
                TraceSource::new("https://c/y.pcap", 0),
            ],
        );

        let stems: Vec<_> = plan.iter().map(|job| job.stem.as_str()).collect();
        assert_eq!(stems, ["x", "x-1", "y"]);
        assert_eq!(plan[1].output, std::path::Path::new("/out/x-1.csv"));
        assert_eq!(plan[1].capture, std::path::Path::new("/work/x-1.pcap"));
    }
}
