//! Quota-aware batch dispatcher for copy generation.
//!
//! Requests are queued by key and coalesced into batches of at most
//! `batch_size`. One batch is in flight at a time. Each batch goes to the first
//! usable quota resource; a quota rejection moves it to the next one, any other
//! backend error abandons it. Results are matched to requests by key, never by
//! position, and anything left without a result is kept aside as unresolved
//! for the caller to collect.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::backend::AiBackend;
use super::models::{ContentRequest, DispatcherStats};
use super::prompt::{build_batch_prompt, parse_batch_response};
use crate::idle_barrier::IdleBarrier;
use crate::metrics;
use crate::quota::{QuotaError, QuotaRegistry};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum requests per backend call.
    pub batch_size: usize,
    /// Resource selections per batch before it is given up.
    pub max_attempts: u32,
    /// Pause between batch cycles.
    pub poll_interval: Duration,
    /// Upper bound on the wait when every resource is exhausted.
    pub exhausted_wait: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_attempts: 5,
            poll_interval: Duration::from_secs(2),
            exhausted_wait: Duration::from_secs(10),
        }
    }
}

/// Receives generated copy for a key.
#[async_trait]
pub trait ContentSink: Send + Sync {
    async fn apply_copy(&self, key: &str, copy: &str) -> anyhow::Result<()>;
}

enum BatchOutcome {
    Finished,
    /// Shutdown arrived mid-batch; the items go back to the queue.
    Interrupted,
}

struct DispatcherState {
    pending: VecDeque<ContentRequest>,
    /// Keys currently pending or in flight.
    keys: HashSet<String>,
    in_flight: usize,
    unresolved: Vec<ContentRequest>,
    running: bool,
    accepting: bool,
    stats: DispatcherStats,
}

pub struct BatchDispatcher {
    state: Mutex<DispatcherState>,
    idle: IdleBarrier,
    registry: Arc<QuotaRegistry>,
    backend: Arc<dyn AiBackend>,
    sink: Arc<dyn ContentSink>,
    config: DispatcherConfig,
    shutdown_token: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BatchDispatcher {
    pub fn new(
        config: DispatcherConfig,
        registry: Arc<QuotaRegistry>,
        backend: Arc<dyn AiBackend>,
        sink: Arc<dyn ContentSink>,
    ) -> Self {
        Self {
            state: Mutex::new(DispatcherState {
                pending: VecDeque::new(),
                keys: HashSet::new(),
                in_flight: 0,
                unresolved: Vec::new(),
                running: false,
                accepting: true,
                stats: DispatcherStats::default(),
            }),
            idle: IdleBarrier::new(),
            registry,
            backend,
            sink,
            config,
            shutdown_token: CancellationToken::new(),
            worker: Mutex::new(None),
        }
    }

    /// Queue a request, starting the background loop if it is not running.
    ///
    /// Returns false if the key is already queued or the dispatcher is shut down.
    pub fn enqueue(self: &Arc<Self>, request: ContentRequest) -> bool {
        let mut state = self.lock_state();
        if !state.accepting {
            warn!("Content dispatcher is shut down, not accepting {}", request.key);
            return false;
        }
        if !state.keys.insert(request.key.clone()) {
            debug!("Content request already queued: {}", request.key);
            return false;
        }
        state.pending.push_back(request);
        self.idle.set_idle(false);
        Self::publish_depth(&state);

        if !state.running {
            state.running = true;
            let handle = tokio::spawn(self.clone().run());
            *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        }
        true
    }

    /// Wait until no request is pending or in flight, or the dispatcher is shut down.
    pub async fn wait_for_idle(&self) {
        tokio::select! {
            _ = self.idle.wait() => {}
            _ = self.shutdown_token.cancelled() => {}
        }
    }

    pub fn is_idle(&self) -> bool {
        self.idle.is_idle()
    }

    /// Drain the requests that finished without a result.
    pub fn take_unresolved(&self) -> Vec<ContentRequest> {
        std::mem::take(&mut self.lock_state().unresolved)
    }

    pub fn stats(&self) -> DispatcherStats {
        let state = self.lock_state();
        DispatcherStats {
            pending: state.pending.len(),
            in_flight: state.in_flight,
            ..state.stats.clone()
        }
    }

    /// Stop the loop and flush the quota registry.
    ///
    /// A batch interrupted mid-call is returned to the pending queue.
    pub async fn shutdown(&self) -> Result<(), QuotaError> {
        info!("Shutting down content dispatcher");
        self.lock_state().accepting = false;
        self.shutdown_token.cancel();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!("Content dispatcher task failed during shutdown: {}", e);
            }
        }

        self.registry.persist()?;
        let stats = self.stats();
        info!(
            "Content dispatcher stopped ({} resolved, {} unresolved, {} still pending)",
            stats.resolved, stats.unresolved, stats.pending
        );
        Ok(())
    }

    // =========================================================================
    // Background loop
    // =========================================================================

    async fn run(self: Arc<Self>) {
        debug!("Content dispatcher loop started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = self.shutdown_token.cancelled() => break,
            }

            let batch = {
                let mut state = self.lock_state();
                if state.pending.is_empty() {
                    state.running = false;
                    self.idle.set_idle(state.in_flight == 0);
                    debug!("Content queue drained, dispatcher loop exiting");
                    return;
                }
                let take = self.config.batch_size.max(1).min(state.pending.len());
                let batch: Vec<ContentRequest> = state.pending.drain(..take).collect();
                state.in_flight = batch.len();
                Self::publish_depth(&state);
                batch
            };

            if let Err(e) = self.registry.prune() {
                warn!("Failed to prune quota history: {}", e);
            }

            info!("Dispatching content batch of {} items", batch.len());
            let outcome = self.process_batch(&batch).await;
            match outcome {
                BatchOutcome::Finished => {
                    let mut state = self.lock_state();
                    for request in &batch {
                        state.keys.remove(&request.key);
                    }
                    state.in_flight = 0;
                    self.idle.set_idle(state.pending.is_empty());
                    Self::publish_depth(&state);
                }
                BatchOutcome::Interrupted => {
                    let mut state = self.lock_state();
                    for request in batch.into_iter().rev() {
                        state.pending.push_front(request);
                    }
                    state.in_flight = 0;
                    Self::publish_depth(&state);
                    break;
                }
            }
        }

        self.lock_state().running = false;
        debug!("Content dispatcher loop stopped");
    }

    async fn process_batch(&self, batch: &[ContentRequest]) -> BatchOutcome {
        let prompt = match build_batch_prompt(batch) {
            Ok(prompt) => prompt,
            Err(e) => {
                error!("Content batch of {} items abandoned: {}", batch.len(), e);
                self.abandon(batch);
                return BatchOutcome::Finished;
            }
        };
        let mut exhausted: HashSet<String> = HashSet::new();

        for attempt in 1..=self.config.max_attempts.max(1) {
            let resource = match self.registry.usable_resource_excluding(&exhausted) {
                Some(resource) => resource,
                None => {
                    let wait = self
                        .registry
                        .time_until_available()
                        .map_or(self.config.exhausted_wait, |w| {
                            w.min(self.config.exhausted_wait)
                        });
                    info!(
                        "No quota resource available (attempt {}), waiting {:?}",
                        attempt, wait
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        _ = self.shutdown_token.cancelled() => return BatchOutcome::Interrupted,
                    }
                    exhausted.clear();
                    continue;
                }
            };

            let result = tokio::select! {
                result = self.backend.generate(&resource, &prompt) => result,
                _ = self.shutdown_token.cancelled() => return BatchOutcome::Interrupted,
            };

            match result {
                Ok(text) => {
                    self.record_request(&resource, "success");
                    self.lock_state().stats.batches_sent += 1;
                    self.apply_results(batch, &resource, &text).await;
                    return BatchOutcome::Finished;
                }
                Err(e) if e.is_quota_exceeded() => {
                    self.record_request(&resource, "quota_exceeded");
                    warn!(
                        "Resource {} rejected batch for quota, trying another: {}",
                        resource, e
                    );
                    exhausted.insert(resource);
                }
                Err(e) => {
                    if e.reached_backend() {
                        self.record_request(&resource, "error");
                    } else {
                        metrics::record_ai_request(&resource, "error");
                    }
                    error!(
                        "Content batch of {} items abandoned after backend error on {}: {}",
                        batch.len(),
                        resource,
                        e
                    );
                    self.abandon(batch);
                    return BatchOutcome::Finished;
                }
            }
        }

        warn!(
            "Content batch of {} items gave up after {} attempts",
            batch.len(),
            self.config.max_attempts
        );
        self.abandon(batch);
        BatchOutcome::Finished
    }

    async fn apply_results(&self, batch: &[ContentRequest], resource: &str, text: &str) {
        let results = match parse_batch_response(text) {
            Ok(results) => results,
            Err(e) => {
                error!("Unusable batch reply from {}: {}", resource, e);
                self.abandon(batch);
                return;
            }
        };

        let mut outstanding: HashMap<&str, &ContentRequest> =
            batch.iter().map(|r| (r.key.as_str(), r)).collect();
        let mut resolved = 0usize;

        for result in results {
            if !outstanding.contains_key(result.key.as_str()) {
                debug!("Ignoring result for unknown or repeated key {}", result.key);
                continue;
            }
            match self.sink.apply_copy(&result.key, &result.copy).await {
                Ok(()) => {
                    outstanding.remove(result.key.as_str());
                    resolved += 1;
                }
                Err(e) => error!("Failed to store copy for {}: {:#}", result.key, e),
            }
        }

        let missing: Vec<ContentRequest> = batch
            .iter()
            .filter(|r| outstanding.contains_key(r.key.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            warn!(
                "{} of {} batch items came back without usable copy",
                missing.len(),
                batch.len()
            );
        }

        metrics::record_content_items("resolved", resolved);
        metrics::record_content_items("unresolved", missing.len());
        let mut state = self.lock_state();
        state.stats.resolved += resolved as u64;
        state.stats.unresolved += missing.len() as u64;
        state.unresolved.extend(missing);
    }

    fn abandon(&self, batch: &[ContentRequest]) {
        metrics::record_content_items("unresolved", batch.len());
        let mut state = self.lock_state();
        state.stats.batches_failed += 1;
        state.stats.unresolved += batch.len() as u64;
        state.unresolved.extend(batch.iter().cloned());
    }

    fn record_request(&self, resource: &str, outcome: &str) {
        metrics::record_ai_request(resource, outcome);
        if let Err(e) = self.registry.record_request(resource) {
            warn!("Failed to record request on {}: {}", resource, e);
        }
    }

    fn publish_depth(state: &DispatcherState) {
        metrics::set_queue_depth("content", state.pending.len(), state.in_flight);
    }

    fn lock_state(&self) -> MutexGuard<'_, DispatcherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
