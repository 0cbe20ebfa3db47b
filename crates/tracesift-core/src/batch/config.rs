use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker count must be at least 1")]
    ZeroWorkers,
    #[error("{role} directory {} does not exist", .path.display())]
    MissingDirectory { role: &'static str, path: PathBuf },
}

/// Directories and limits for one batch run.
///
/// Built once by the caller. The scheduler reads it but never creates or
/// changes the directories it names.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Where fetched and decompressed captures are placed.
    pub work_dir: PathBuf,
    /// Where per-trace CSV files are written.
    pub output_dir: PathBuf,
    pub workers: usize,
    /// Keep fetched captures after their job finishes.
    pub keep_captures: bool,
}

impl BatchConfig {
    pub fn new(work_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            output_dir: output_dir.into(),
            workers: DEFAULT_WORKERS,
            keep_captures: false,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn keep_captures(mut self, keep: bool) -> Self {
        self.keep_captures = keep;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        for (role, path) in [("work", &self.work_dir), ("output", &self.output_dir)] {
            if !path.is_dir() {
                return Err(ConfigError::MissingDirectory {
                    role,
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }
}
