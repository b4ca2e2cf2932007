//! Persistence for pending download jobs.

use std::path::PathBuf;

use super::models::{DownloadJob, ImageQueueError};
use crate::persistence::{read_json_or_default, write_json_atomic};

/// Storage for the jobs that have not finished yet.
pub trait DownloadQueueStore: Send + Sync {
    /// Load all persisted jobs. An absent store means no jobs.
    fn load(&self) -> Result<Vec<DownloadJob>, ImageQueueError>;

    /// Replace the persisted jobs with `jobs`.
    fn save(&self, jobs: &[DownloadJob]) -> Result<(), ImageQueueError>;
}

/// Jobs stored as a JSON array of `{source_url, destination_path}` records.
pub struct JsonDownloadQueueStore {
    path: PathBuf,
}

impl JsonDownloadQueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DownloadQueueStore for JsonDownloadQueueStore {
    fn load(&self) -> Result<Vec<DownloadJob>, ImageQueueError> {
        Ok(read_json_or_default(&self.path)?)
    }

    fn save(&self, jobs: &[DownloadJob]) -> Result<(), ImageQueueError> {
        Ok(write_json_atomic(&self.path, jobs)?)
    }
}

/// Store that keeps nothing. Used when no queue file is configured.
pub struct NullDownloadQueueStore;

impl DownloadQueueStore for NullDownloadQueueStore {
    fn load(&self) -> Result<Vec<DownloadJob>, ImageQueueError> {
        Ok(Vec::new())
    }

    fn save(&self, _jobs: &[DownloadJob]) -> Result<(), ImageQueueError> {
        Ok(())
    }
}
