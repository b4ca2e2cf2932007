//! Persistence for quota usage history.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::persistence::{read_json_or_default, write_json_atomic, PersistenceError};

/// Request timestamps per resource name.
pub type QuotaState = BTreeMap<String, Vec<DateTime<Utc>>>;

/// Storage for quota usage history.
pub trait QuotaStateStore: Send + Sync {
    fn load(&self) -> Result<QuotaState, PersistenceError>;
    fn save(&self, state: &QuotaState) -> Result<(), PersistenceError>;
}

/// Usage history stored as `{"resource": ["2024-01-01T00:00:00Z", ...]}`.
pub struct JsonQuotaStateStore {
    path: PathBuf,
}

impl JsonQuotaStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl QuotaStateStore for JsonQuotaStateStore {
    fn load(&self) -> Result<QuotaState, PersistenceError> {
        read_json_or_default(&self.path)
    }

    fn save(&self, state: &QuotaState) -> Result<(), PersistenceError> {
        write_json_atomic(&self.path, state)
    }
}

/// Store that keeps the last saved state in memory only.
#[derive(Default)]
pub struct InMemoryQuotaStateStore {
    state: Mutex<QuotaState>,
}

impl QuotaStateStore for InMemoryQuotaStateStore {
    fn load(&self) -> Result<QuotaState, PersistenceError> {
        Ok(self.state.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, state: &QuotaState) -> Result<(), PersistenceError> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state.clone();
        Ok(())
    }
}
