//! Bounded-concurrency, deduplicating image download queue.
//!
//! Jobs are keyed by their destination path (derived from the URL hash), so a
//! URL can be pending or in flight at most once. A single dispatcher task pulls
//! jobs off the pending FIFO and hands each one to a worker holding a
//! semaphore permit. Failed fetches go back to the end of the FIFO; jobs
//! interrupted by shutdown go back too and are persisted with the rest.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::fetcher::ImageFetcher;
use super::models::{DownloadJob, DownloadQueueStats, ImageQueueError, JobOutcome};
use super::post_process::{ImagePostProcessor, PostProcessOutcome};
use super::queue_store::DownloadQueueStore;
use crate::idle_barrier::IdleBarrier;
use crate::metrics;
use crate::persistence::write_bytes_atomic;

/// Tuning for the download queue.
#[derive(Debug, Clone)]
pub struct DownloadQueueConfig {
    /// Maximum number of jobs executing at once.
    pub parallelism: usize,
    /// Pause before a failed job is put back on the queue.
    pub retry_delay: Duration,
    /// Give up on a job after this many failed fetches. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// How often unfinished jobs are snapshotted to the store.
    pub persist_interval: Duration,
}

impl Default for DownloadQueueConfig {
    fn default() -> Self {
        Self {
            parallelism: 8,
            retry_delay: Duration::from_millis(500),
            max_attempts: None,
            persist_interval: Duration::from_secs(5),
        }
    }
}

/// How a worker finished with a job.
enum Completion {
    Finished(JobOutcome),
    Failed(ImageQueueError),
    Interrupted,
}

struct QueueState {
    pending: VecDeque<DownloadJob>,
    in_flight: HashMap<PathBuf, DownloadJob>,
    /// Destination paths currently pending or in flight.
    known: HashSet<PathBuf>,
    attempts: HashMap<PathBuf, u32>,
    accepting: bool,
    dirty: bool,
    stats: DownloadQueueStats,
}

impl QueueState {
    fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }
}

pub struct DownloadQueue {
    state: Mutex<QueueState>,
    work_available: Notify,
    idle: IdleBarrier,
    fetcher: Arc<dyn ImageFetcher>,
    post_processor: Arc<dyn ImagePostProcessor>,
    store: Arc<dyn DownloadQueueStore>,
    config: DownloadQueueConfig,
    shutdown_token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DownloadQueue {
    pub fn new(
        config: DownloadQueueConfig,
        fetcher: Arc<dyn ImageFetcher>,
        post_processor: Arc<dyn ImagePostProcessor>,
        store: Arc<dyn DownloadQueueStore>,
    ) -> Self {
        Self {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                in_flight: HashMap::new(),
                known: HashSet::new(),
                attempts: HashMap::new(),
                accepting: true,
                dirty: false,
                stats: DownloadQueueStats::default(),
            }),
            work_available: Notify::new(),
            idle: IdleBarrier::new(),
            fetcher,
            post_processor,
            store,
            config,
            shutdown_token: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Restore persisted jobs and spawn the background tasks.
    ///
    /// Returns the number of jobs restored from the store.
    pub fn start(self: &Arc<Self>) -> Result<usize, ImageQueueError> {
        let restored = self.store.load()?;
        let mut count = 0;
        for job in restored {
            if self.register(job) {
                count += 1;
            }
        }
        if count > 0 {
            info!("Restored {} pending image downloads", count);
        }

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.push(tokio::spawn(self.clone().run()));
        tasks.push(tokio::spawn(self.clone().persist_periodically()));
        Ok(count)
    }

    /// Queue `source_url` for download into `destination_folder`.
    ///
    /// Returns the final file path right away; the file appears once the job
    /// completes. Enqueuing a URL that is already pending, in flight, or on
    /// disk is a no-op.
    pub fn enqueue(&self, source_url: &str, destination_folder: &Path) -> PathBuf {
        let job = DownloadJob::new(source_url, destination_folder);
        let path = job.destination_path.clone();
        self.register(job);
        path
    }

    fn register(&self, job: DownloadJob) -> bool {
        let mut state = self.lock_state();
        if !state.accepting {
            warn!(
                "Image queue is shut down, not accepting {}",
                job.source_url
            );
            return false;
        }
        if state.known.contains(&job.destination_path) {
            debug!("Already queued: {}", job.source_url);
            return false;
        }
        if job.destination_path.exists() {
            state.stats.already_present += 1;
            return false;
        }

        state.known.insert(job.destination_path.clone());
        state.pending.push_back(job);
        state.dirty = true;
        self.idle.set_idle(false);
        Self::publish_depth(&state);
        drop(state);

        self.work_available.notify_one();
        true
    }

    /// Wait until nothing is pending or in flight, or the queue is shut down.
    pub async fn wait_for_idle(&self) {
        tokio::select! {
            _ = self.idle.wait() => {}
            _ = self.shutdown_token.cancelled() => {}
        }
    }

    pub fn is_idle(&self) -> bool {
        self.idle.is_idle()
    }

    pub fn stats(&self) -> DownloadQueueStats {
        let state = self.lock_state();
        DownloadQueueStats {
            pending: state.pending.len(),
            in_flight: state.in_flight.len(),
            ..state.stats.clone()
        }
    }

    /// Stop background processing and persist whatever is left.
    ///
    /// In-flight jobs are interrupted and put back on the queue before the
    /// final snapshot is written.
    pub async fn shutdown(&self) -> Result<(), ImageQueueError> {
        info!("Shutting down image download queue");
        self.lock_state().accepting = false;
        self.shutdown_token.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            if let Err(e) = task.await {
                error!("Image queue task failed during shutdown: {}", e);
            }
        }

        let remaining = self.persist()?;
        info!(
            "Image download queue stopped, {} unfinished jobs persisted",
            remaining
        );
        Ok(())
    }

    /// Write pending and in-flight jobs to the store. Returns how many were written.
    pub fn persist(&self) -> Result<usize, ImageQueueError> {
        let jobs: Vec<DownloadJob> = {
            let mut state = self.lock_state();
            state.dirty = false;
            state
                .in_flight
                .values()
                .chain(state.pending.iter())
                .cloned()
                .collect()
        };
        self.store.save(&jobs)?;
        Ok(jobs.len())
    }

    // =========================================================================
    // Background tasks
    // =========================================================================

    async fn run(self: Arc<Self>) {
        info!(
            "Image download queue started (parallelism={})",
            self.config.parallelism
        );
        let permits = Arc::new(Semaphore::new(self.config.parallelism.max(1)));
        let mut workers = JoinSet::new();

        loop {
            let permit = tokio::select! {
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = self.shutdown_token.cancelled() => break,
            };

            let job = tokio::select! {
                job = self.next_job() => job,
                _ = self.shutdown_token.cancelled() => break,
            };

            let queue = self.clone();
            workers.spawn(async move {
                let _permit = permit;
                queue.process(job).await;
            });

            while let Some(result) = workers.try_join_next() {
                if let Err(e) = result {
                    error!("Download worker panicked: {}", e);
                }
            }
        }

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!("Download worker panicked: {}", e);
            }
        }
        debug!("Image download dispatcher exited");
    }

    async fn persist_periodically(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.persist_interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.lock_state().dirty {
                        continue;
                    }
                    if let Err(e) = self.persist() {
                        warn!("Failed to snapshot image queue: {}", e);
                    }
                }
                _ = self.shutdown_token.cancelled() => break,
            }
        }
    }

    async fn next_job(&self) -> DownloadJob {
        loop {
            if let Some(job) = self.claim_next() {
                return job;
            }
            self.work_available.notified().await;
        }
    }

    /// Move the head of the FIFO into the in-flight set under one lock.
    fn claim_next(&self) -> Option<DownloadJob> {
        let mut state = self.lock_state();
        let job = state.pending.pop_front()?;
        state
            .in_flight
            .insert(job.destination_path.clone(), job.clone());
        Self::publish_depth(&state);
        Some(job)
    }

    async fn process(&self, job: DownloadJob) {
        let result = tokio::select! {
            result = self.download(&job) => Some(result),
            _ = self.shutdown_token.cancelled() => None,
        };

        let completion = match result {
            Some(Ok(outcome)) => Completion::Finished(outcome),
            Some(Err(e)) => {
                if e.is_retryable() {
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.retry_delay) => {}
                        _ = self.shutdown_token.cancelled() => {}
                    }
                }
                Completion::Failed(e)
            }
            None => Completion::Interrupted,
        };
        self.finish(job, completion);
    }

    async fn download(&self, job: &DownloadJob) -> Result<JobOutcome, ImageQueueError> {
        if tokio::fs::try_exists(&job.destination_path).await? {
            return Ok(JobOutcome::AlreadyPresent);
        }

        let bytes = self.fetcher.fetch(&job.source_url).await?;

        let path = job.destination_path.clone();
        let processor = self.post_processor.clone();
        tokio::task::spawn_blocking(move || -> Result<(), ImageQueueError> {
            write_bytes_atomic(&path, &bytes)?;
            match processor.process(&path) {
                Ok(PostProcessOutcome::Shrunk { cycles, bytes }) => {
                    debug!(
                        "Shrunk {:?} to {} bytes in {} cycles",
                        path, bytes, cycles
                    );
                }
                Ok(_) => {}
                // The original file is still usable.
                Err(e) => warn!("Post-processing failed for {:?}: {}", path, e),
            }
            Ok(())
        })
        .await
        .map_err(|e| ImageQueueError::Io(std::io::Error::other(e)))??;

        Ok(JobOutcome::Downloaded)
    }

    fn finish(&self, job: DownloadJob, completion: Completion) {
        let mut state = self.lock_state();
        let key = job.destination_path.clone();
        state.in_flight.remove(&key);
        state.dirty = true;

        match completion {
            Completion::Finished(outcome) => {
                state.known.remove(&key);
                state.attempts.remove(&key);
                match outcome {
                    JobOutcome::Downloaded => {
                        state.stats.downloaded += 1;
                        metrics::record_image_download("downloaded");
                        debug!("Downloaded {} -> {:?}", job.source_url, key);
                    }
                    JobOutcome::AlreadyPresent => {
                        state.stats.already_present += 1;
                        metrics::record_image_download("already_present");
                    }
                }
            }
            Completion::Interrupted => {
                debug!("Download of {} interrupted, re-queued", job.source_url);
                state.pending.push_back(job);
            }
            Completion::Failed(e) => {
                let attempts = {
                    let counter = state.attempts.entry(key.clone()).or_insert(0);
                    *counter += 1;
                    *counter
                };
                let exhausted = self
                    .config
                    .max_attempts
                    .is_some_and(|max| attempts >= max);

                if e.is_retryable() && !exhausted {
                    warn!(
                        "Download of {} failed (attempt {}), re-queued: {}",
                        job.source_url, attempts, e
                    );
                    state.stats.requeued += 1;
                    metrics::record_image_download("requeued");
                    state.pending.push_back(job);
                } else {
                    error!(
                        "Dropping download of {} after {} attempts: {}",
                        job.source_url, attempts, e
                    );
                    state.known.remove(&key);
                    state.attempts.remove(&key);
                    state.stats.failed += 1;
                    metrics::record_image_download("failed");
                }
            }
        }

        let requeued = !state.pending.is_empty();
        self.idle.set_idle(state.is_drained());
        Self::publish_depth(&state);
        drop(state);

        if requeued {
            self.work_available.notify_one();
        }
    }

    fn publish_depth(state: &QueueState) {
        metrics::set_queue_depth("images", state.pending.len(), state.in_flight.len());
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_queue::post_process::NoOpPostProcessor;
    use crate::image_queue::queue_store::{JsonDownloadQueueStore, NullDownloadQueueStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(5);

    /// Fetcher that records calls and can be scripted to fail or block.
    struct FakeFetcher {
        calls: Mutex<HashMap<String, u32>>,
        failures_before_success: u32,
        http_status: Option<u16>,
        gate: Option<Arc<Semaphore>>,
        delay: Duration,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl FakeFetcher {
        fn new() -> Self {
            Self {
                calls: Mutex::new(HashMap::new()),
                failures_before_success: 0,
                http_status: None,
                gate: None,
                delay: Duration::ZERO,
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
            }
        }

        fn gated(gate: Arc<Semaphore>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new()
            }
        }

        fn calls_for(&self, url: &str) -> u32 {
            self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl ImageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageQueueError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let entry = calls.entry(url.to_string()).or_insert(0);
                *entry += 1;
                *entry
            };

            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);

            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.unwrap();
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            if let Some(status) = self.http_status {
                return Err(ImageQueueError::Http {
                    url: url.to_string(),
                    status,
                });
            }
            if call <= self.failures_before_success {
                return Err(ImageQueueError::Connection {
                    url: url.to_string(),
                    message: "connection reset".to_string(),
                });
            }
            Ok(format!("image bytes for {}", url).into_bytes())
        }
    }

    fn test_config() -> DownloadQueueConfig {
        DownloadQueueConfig {
            parallelism: 4,
            retry_delay: Duration::from_millis(5),
            max_attempts: None,
            persist_interval: Duration::from_millis(50),
        }
    }

    fn make_queue(
        fetcher: Arc<FakeFetcher>,
        store: Arc<dyn DownloadQueueStore>,
        config: DownloadQueueConfig,
    ) -> Arc<DownloadQueue> {
        Arc::new(DownloadQueue::new(
            config,
            fetcher,
            Arc::new(NoOpPostProcessor),
            store,
        ))
    }

    fn files_in(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .map(|entries| entries.filter_map(Result::ok).count())
            .unwrap_or(0)
    }

    async fn wait_idle(queue: &DownloadQueue) {
        tokio::time::timeout(WAIT, queue.wait_for_idle())
            .await
            .expect("queue should become idle");
    }

    #[tokio::test]
    async fn test_repeated_url_produces_one_file() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher::new());
        let queue = make_queue(fetcher.clone(), Arc::new(NullDownloadQueueStore), test_config());
        queue.start().unwrap();

        let a1 = queue.enqueue("https://cdn.example.com/a.png", dir.path());
        let b = queue.enqueue("https://cdn.example.com/b.jpg", dir.path());
        let a2 = queue.enqueue("https://cdn.example.com/a.png", dir.path());
        assert_eq!(a1, a2);
        assert_ne!(a1, b);

        wait_idle(&queue).await;

        assert_eq!(files_in(dir.path()), 2);
        assert!(a1.exists());
        assert!(b.exists());
        assert_eq!(fetcher.calls_for("https://cdn.example.com/a.png"), 1);
        queue.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_enqueue_keeps_single_pending_job() {
        let dir = TempDir::new().unwrap();
        let queue = make_queue(
            Arc::new(FakeFetcher::new()),
            Arc::new(NullDownloadQueueStore),
            test_config(),
        );

        for _ in 0..5 {
            queue.enqueue("https://cdn.example.com/a.png", dir.path());
        }

        assert_eq!(queue.stats().pending, 1);
        assert!(!queue.is_idle());
    }

    #[tokio::test]
    async fn test_existing_file_is_not_fetched() {
        let dir = TempDir::new().unwrap();
        let url = "https://cdn.example.com/exists.png";
        let expected = DownloadJob::new(url, dir.path()).destination_path;
        std::fs::write(&expected, b"already here").unwrap();

        let fetcher = Arc::new(FakeFetcher::new());
        let queue = make_queue(fetcher.clone(), Arc::new(NullDownloadQueueStore), test_config());
        queue.start().unwrap();

        assert_eq!(queue.enqueue(url, dir.path()), expected);
        wait_idle(&queue).await;

        let stats = queue.stats();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.already_present, 1);
        assert_eq!(fetcher.calls_for(url), 0);
        assert_eq!(std::fs::read(&expected).unwrap(), b"already here");
    }

    #[tokio::test]
    async fn test_transient_failures_are_requeued() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher {
            failures_before_success: 2,
            ..FakeFetcher::new()
        });
        let queue = make_queue(fetcher.clone(), Arc::new(NullDownloadQueueStore), test_config());
        queue.start().unwrap();

        let url = "https://cdn.example.com/flaky.png";
        let path = queue.enqueue(url, dir.path());
        wait_idle(&queue).await;

        assert!(path.exists());
        assert_eq!(fetcher.calls_for(url), 3);
        let stats = queue.stats();
        assert_eq!(stats.requeued, 2);
        assert_eq!(stats.downloaded, 1);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn test_max_attempts_drops_job() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher {
            failures_before_success: 100,
            ..FakeFetcher::new()
        });
        let config = DownloadQueueConfig {
            max_attempts: Some(3),
            ..test_config()
        };
        let queue = make_queue(fetcher.clone(), Arc::new(NullDownloadQueueStore), config);
        queue.start().unwrap();

        let url = "https://cdn.example.com/down.png";
        let path = queue.enqueue(url, dir.path());
        wait_idle(&queue).await;

        assert!(!path.exists());
        assert_eq!(fetcher.calls_for(url), 3);
        assert_eq!(queue.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_not_found_is_dropped_without_retry() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher {
            http_status: Some(404),
            ..FakeFetcher::new()
        });
        let queue = make_queue(fetcher.clone(), Arc::new(NullDownloadQueueStore), test_config());
        queue.start().unwrap();

        let url = "https://cdn.example.com/missing.png";
        let path = queue.enqueue(url, dir.path());
        wait_idle(&queue).await;

        assert!(!path.exists());
        assert_eq!(fetcher.calls_for(url), 1);
        assert_eq!(queue.stats().failed, 1);
    }

    #[tokio::test]
    async fn test_wait_for_idle_blocks_while_in_flight() {
        let dir = TempDir::new().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let fetcher = Arc::new(FakeFetcher::gated(gate.clone()));
        let queue = make_queue(fetcher, Arc::new(NullDownloadQueueStore), test_config());
        queue.start().unwrap();

        let path = queue.enqueue("https://cdn.example.com/slow.png", dir.path());
        tokio::time::sleep(Duration::from_millis(50)).await;

        let stats = queue.stats();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.in_flight, 1);
        assert!(!queue.is_idle());

        let early = tokio::time::timeout(Duration::from_millis(100), queue.wait_for_idle()).await;
        assert!(early.is_err(), "must not be idle with a job in flight");

        gate.add_permits(1);
        wait_idle(&queue).await;
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_enqueue_while_idle_rearms_barrier() {
        let dir = TempDir::new().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let fetcher = Arc::new(FakeFetcher::gated(gate.clone()));
        let queue = make_queue(fetcher, Arc::new(NullDownloadQueueStore), test_config());
        queue.start().unwrap();

        wait_idle(&queue).await;

        let path = queue.enqueue("https://cdn.example.com/late.png", dir.path());
        assert!(!queue.is_idle());
        let early = tokio::time::timeout(Duration::from_millis(100), queue.wait_for_idle()).await;
        assert!(early.is_err());

        gate.add_permits(1);
        wait_idle(&queue).await;
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_parallelism_is_bounded() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(FakeFetcher {
            delay: Duration::from_millis(30),
            ..FakeFetcher::new()
        });
        let config = DownloadQueueConfig {
            parallelism: 2,
            ..test_config()
        };
        let queue = make_queue(fetcher.clone(), Arc::new(NullDownloadQueueStore), config);
        queue.start().unwrap();

        for i in 0..6 {
            queue.enqueue(&format!("https://cdn.example.com/{}.png", i), dir.path());
        }
        wait_idle(&queue).await;

        assert_eq!(files_in(dir.path()), 6);
        assert!(fetcher.max_active.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_shutdown_persists_and_restart_resumes() {
        let media = TempDir::new().unwrap();
        let state = TempDir::new().unwrap();
        let store = Arc::new(JsonDownloadQueueStore::new(state.path().join("queue.json")));

        let gate = Arc::new(Semaphore::new(0));
        let blocked = make_queue(
            Arc::new(FakeFetcher::gated(gate)),
            store.clone(),
            test_config(),
        );
        blocked.start().unwrap();
        let a = blocked.enqueue("https://cdn.example.com/a.png", media.path());
        let b = blocked.enqueue("https://cdn.example.com/b.png", media.path());
        tokio::time::sleep(Duration::from_millis(50)).await;

        blocked.shutdown().await.unwrap();
        assert_eq!(store.load().unwrap().len(), 2);
        assert!(!a.exists());

        let resumed = make_queue(Arc::new(FakeFetcher::new()), store.clone(), test_config());
        assert_eq!(resumed.start().unwrap(), 2);
        wait_idle(&resumed).await;
        resumed.shutdown().await.unwrap();

        assert!(a.exists());
        assert!(b.exists());
        assert!(store.load().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_is_rejected() {
        let dir = TempDir::new().unwrap();
        let queue = make_queue(
            Arc::new(FakeFetcher::new()),
            Arc::new(NullDownloadQueueStore),
            test_config(),
        );
        queue.start().unwrap();
        queue.shutdown().await.unwrap();

        queue.enqueue("https://cdn.example.com/late.png", dir.path());
        assert_eq!(queue.stats().pending, 0);
    }
}
