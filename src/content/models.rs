//! Data models for content generation.

use serde::{Deserialize, Serialize};

/// One unit of copy-generation work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRequest {
    /// Correlation key; the entity's canonical URL.
    pub key: String,
    /// Source text the copy is written from.
    pub context: String,
}

impl ContentRequest {
    pub fn new(key: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            context: context.into(),
        }
    }
}

/// Generated copy for one key, as parsed from a batch response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCopy {
    pub key: String,
    pub copy: String,
}

/// Snapshot of dispatcher counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    pub pending: usize,
    pub in_flight: usize,
    pub resolved: u64,
    pub unresolved: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
}
