use std::collections::HashMap;
use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracesift_core::{JobOutcome, JobProgress, JobStatus, ProgressSink};

const JOB_TEMPLATE: &str = "{spinner:.green} {msg:32} [{bar:30.cyan/blue}] {pos}/{len} frames";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg:32} {pos} frames";
const OVERALL_TEMPLATE: &str = "[{elapsed_precise}] [{bar:40.green/white}] {pos}/{len} traces";

/// One bar per running job under a shared overall bar.
pub struct BarProgress {
    multi: MultiProgress,
    overall: ProgressBar,
    jobs: Mutex<HashMap<usize, ProgressBar>>,
}

impl BarProgress {
    pub fn new(total_jobs: u64, hidden: bool) -> Self {
        let multi = if hidden {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        } else {
            MultiProgress::new()
        };
        let overall = multi.add(ProgressBar::new(total_jobs));
        overall.set_style(style(OVERALL_TEMPLATE, ProgressStyle::default_bar()).progress_chars("#>-"));
        Self {
            multi,
            overall,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    pub fn finish(&self) {
        self.overall.finish_and_clear();
    }
}

impl ProgressSink for BarProgress {
    fn job_started(&self, index: usize, label: &str, expected_records: u64) {
        let bar = if expected_records > 0 {
            let bar = ProgressBar::new(expected_records);
            bar.set_style(style(JOB_TEMPLATE, ProgressStyle::default_bar()).progress_chars("#>-"));
            bar
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(style(SPINNER_TEMPLATE, ProgressStyle::default_spinner()));
            bar
        };
        bar.set_message(label.to_string());
        let bar = self.multi.insert_before(&self.overall, bar);
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.insert(index, bar);
        }
    }

    fn progress(&self, index: usize, progress: JobProgress) {
        if let Ok(jobs) = self.jobs.lock() {
            if let Some(bar) = jobs.get(&index) {
                if bar.length().is_some_and(|len| progress.processed > len) {
                    bar.set_length(progress.processed);
                }
                bar.set_position(progress.processed);
            }
        }
    }

    fn job_finished(&self, outcome: &JobOutcome) {
        let bar = self
            .jobs
            .lock()
            .ok()
            .and_then(|mut jobs| jobs.remove(&outcome.index));
        if let Some(bar) = bar {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        if let JobStatus::Failed { category, .. } = &outcome.status {
            let _ = self
                .multi
                .println(format!("failed: {} ({category})", outcome.source.url));
        }
        self.overall.inc(1);
    }
}

fn style(template: &str, fallback: ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or(fallback)
}
