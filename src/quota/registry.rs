//! Sliding-window quota tracking across several AI backends.
//!
//! Each resource keeps a log of request instants and is usable while both its
//! trailing 60-second and trailing 24-hour counts are under their limits.
//! Resources are checked in configuration order, so cheaper or preferred
//! backends are used first. The log is persisted after every recorded request.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::store::{QuotaState, QuotaStateStore};
use crate::clock::Clock;
use crate::persistence::PersistenceError;

fn minute() -> ChronoDuration {
    ChronoDuration::seconds(60)
}

fn day() -> ChronoDuration {
    ChronoDuration::hours(24)
}

/// Limits for one backend resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaResourceConfig {
    pub name: String,
    pub requests_per_minute: u32,
    pub requests_per_day: u32,
}

/// Point-in-time view of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaResourceStatus {
    pub name: String,
    pub requests_last_minute: u32,
    pub requests_last_day: u32,
    pub requests_per_minute: u32,
    pub requests_per_day: u32,
    pub is_usable: bool,
    /// Time until a slot frees up, if currently exhausted.
    pub available_in: Option<Duration>,
}

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("Unknown quota resource: {0}")]
    UnknownResource(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug)]
struct QuotaResource {
    name: String,
    requests_per_minute: u32,
    requests_per_day: u32,
    timestamps: VecDeque<DateTime<Utc>>,
}

impl QuotaResource {
    /// Requests strictly inside `(now - window, now]`.
    fn count_within(&self, now: DateTime<Utc>, window: ChronoDuration) -> u32 {
        let cutoff = now - window;
        self.timestamps
            .iter()
            .filter(|ts| **ts > cutoff && **ts <= now)
            .count() as u32
    }

    fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.count_within(now, minute()) < self.requests_per_minute
            && self.count_within(now, day()) < self.requests_per_day
    }

    /// How long until the oldest request in an exhausted window ages out.
    fn available_in(&self, now: DateTime<Utc>) -> Option<Duration> {
        let wait_for = |window: ChronoDuration, limit: u32| -> Option<ChronoDuration> {
            let in_window: Vec<&DateTime<Utc>> = self
                .timestamps
                .iter()
                .filter(|ts| **ts > now - window && **ts <= now)
                .collect();
            if (in_window.len() as u32) < limit {
                return None;
            }
            // The window frees up once enough of its oldest entries expire.
            let excess = in_window.len() - limit as usize;
            in_window
                .get(excess)
                .map(|oldest| **oldest + window - now)
        };

        let waits = [
            wait_for(minute(), self.requests_per_minute),
            wait_for(day(), self.requests_per_day),
        ];
        waits
            .into_iter()
            .flatten()
            .max()
            .map(|wait| wait.to_std().unwrap_or(Duration::ZERO))
    }

    fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - day();
        let before = self.timestamps.len();
        self.timestamps.retain(|ts| *ts > cutoff);
        before - self.timestamps.len()
    }

    fn status(&self, now: DateTime<Utc>) -> QuotaResourceStatus {
        QuotaResourceStatus {
            name: self.name.clone(),
            requests_last_minute: self.count_within(now, minute()),
            requests_last_day: self.count_within(now, day()),
            requests_per_minute: self.requests_per_minute,
            requests_per_day: self.requests_per_day,
            is_usable: self.is_usable_at(now),
            available_in: self.available_in(now),
        }
    }
}

/// Thread-safe registry of quota-constrained resources.
pub struct QuotaRegistry {
    resources: Mutex<Vec<QuotaResource>>,
    store: Arc<dyn QuotaStateStore>,
    clock: Arc<dyn Clock>,
}

impl QuotaRegistry {
    /// Build the registry in priority order and restore usage history.
    ///
    /// History for resources no longer configured is discarded; history older
    /// than 24 hours is pruned.
    pub fn load(
        configs: Vec<QuotaResourceConfig>,
        store: Arc<dyn QuotaStateStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, QuotaError> {
        let mut persisted = store.load()?;
        let now = clock.now();

        let resources = configs
            .into_iter()
            .map(|config| {
                let mut timestamps: Vec<DateTime<Utc>> =
                    persisted.remove(&config.name).unwrap_or_default();
                timestamps.sort();
                let mut resource = QuotaResource {
                    name: config.name,
                    requests_per_minute: config.requests_per_minute,
                    requests_per_day: config.requests_per_day,
                    timestamps: timestamps.into(),
                };
                resource.prune(now);
                resource
            })
            .collect::<Vec<_>>();

        info!(
            "Quota registry loaded with {} resources: {}",
            resources.len(),
            resources
                .iter()
                .map(|r| r.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            resources: Mutex::new(resources),
            store,
            clock,
        })
    }

    /// Name of the first resource, in priority order, that is under both limits.
    pub fn usable_resource(&self) -> Option<String> {
        self.usable_resource_excluding(&HashSet::new())
    }

    /// Like [`usable_resource`](Self::usable_resource), skipping `excluded`.
    pub fn usable_resource_excluding(&self, excluded: &HashSet<String>) -> Option<String> {
        let now = self.clock.now();
        self.lock_resources()
            .iter()
            .filter(|r| !excluded.contains(&r.name))
            .find(|r| r.is_usable_at(now))
            .map(|r| r.name.clone())
    }

    /// Append a request at the current instant and persist the registry.
    pub fn record_request(&self, name: &str) -> Result<(), QuotaError> {
        let now = self.clock.now();
        let mut resources = self.lock_resources();
        let resource = resources
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| QuotaError::UnknownResource(name.to_string()))?;
        resource.timestamps.push_back(now);
        debug!(
            "Recorded request on {} ({} in the last minute)",
            name,
            resource.count_within(now, minute())
        );

        // Saved under the lock so snapshots hit the disk in order.
        self.store.save(&Self::snapshot(&resources))?;
        Ok(())
    }

    /// Drop timestamps older than 24 hours. Returns how many were removed.
    pub fn prune(&self) -> Result<usize, QuotaError> {
        let now = self.clock.now();
        let mut resources = self.lock_resources();
        let removed: usize = resources.iter_mut().map(|r| r.prune(now)).sum();
        if removed > 0 {
            debug!("Pruned {} expired quota timestamps", removed);
            self.store.save(&Self::snapshot(&resources))?;
        }
        Ok(removed)
    }

    /// Write the current state to the store.
    pub fn persist(&self) -> Result<(), QuotaError> {
        let resources = self.lock_resources();
        self.store.save(&Self::snapshot(&resources))?;
        Ok(())
    }

    /// Shortest wait until any resource becomes usable. `None` if one already is.
    pub fn time_until_available(&self) -> Option<Duration> {
        let now = self.clock.now();
        let resources = self.lock_resources();
        if resources.iter().any(|r| r.is_usable_at(now)) {
            return None;
        }
        resources.iter().filter_map(|r| r.available_in(now)).min()
    }

    pub fn stats(&self) -> Vec<QuotaResourceStatus> {
        let now = self.clock.now();
        self.lock_resources().iter().map(|r| r.status(now)).collect()
    }

    fn snapshot(resources: &[QuotaResource]) -> QuotaState {
        resources
            .iter()
            .map(|r| (r.name.clone(), r.timestamps.iter().copied().collect()))
            .collect()
    }

    fn lock_resources(&self) -> MutexGuard<'_, Vec<QuotaResource>> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
