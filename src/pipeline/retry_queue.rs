//! FIFO retry queue that publishes entities through the editor workflow.
//!
//! Items are processed one at a time on a single automation session. A failed
//! item costs one failure: the draft is discarded if one was opened, the
//! session is torn down, and after a cooldown the item goes to the back of the
//! queue. An item that reaches `max_failures` is marked permanently failed and
//! never retried again in the run. A validation rejection is final on the
//! first failure, since rerunning the same data cannot change the outcome.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::driver::AutomationDriver;
use super::error::{ErrorKind, FailedItem, PipelineError, StepError};
use super::executor::OperationExecutor;
use super::retry_policy::RetryPolicy;
use super::watchdog::ErrorWatchdog;
use super::work_item::{WorkEntity, WorkItem, WorkItemState};
use super::workflow::{EditorWorkflow, WorkflowStep};
use crate::listing::ListingStore;
use crate::metrics;

#[derive(Debug, Clone)]
pub struct RetryQueueConfig {
    /// Item-level failures before an item is given up.
    pub max_failures: u32,
    /// Step-level retries inside one item attempt.
    pub step_max_retries: u32,
    /// Pause after a failed item before the next one starts.
    pub cooldown: Duration,
    pub retry_policy: RetryPolicy,
    /// How often the watchdog polls for error indicators.
    pub watchdog_poll: Duration,
}

impl Default for RetryQueueConfig {
    fn default() -> Self {
        Self {
            max_failures: 3,
            step_max_retries: 3,
            cooldown: Duration::from_secs(30),
            retry_policy: RetryPolicy::default(),
            watchdog_poll: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    AllSucceeded,
    /// Finished, but some items were permanently failed.
    CompletedWithFailures,
    /// Stopped early; some items were never finished.
    Cancelled,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub succeeded: Vec<String>,
    pub permanently_failed: Vec<FailedItem>,
    /// Items left unprocessed when the run was cancelled.
    pub remaining: usize,
}

impl RunReport {
    pub fn outcome(&self) -> RunOutcome {
        if self.remaining > 0 {
            RunOutcome::Cancelled
        } else if !self.permanently_failed.is_empty() {
            RunOutcome::CompletedWithFailures
        } else {
            RunOutcome::AllSucceeded
        }
    }
}

struct StepFailure {
    step: WorkflowStep,
    error: StepError,
    draft_opened: bool,
}

pub struct RetryQueue<E: WorkEntity> {
    config: RetryQueueConfig,
    workflow: Arc<dyn EditorWorkflow<E>>,
    executor: OperationExecutor,
    /// Runs session setup. Has no indicators to watch, since no page is open yet.
    session_executor: OperationExecutor,
    store: Arc<dyn ListingStore>,
    cancel: CancellationToken,
}

impl<E: WorkEntity> RetryQueue<E> {
    pub fn new(
        config: RetryQueueConfig,
        workflow: Arc<dyn EditorWorkflow<E>>,
        driver: Arc<dyn AutomationDriver>,
        store: Arc<dyn ListingStore>,
        cancel: CancellationToken,
    ) -> Self {
        let watchdog = ErrorWatchdog::new(workflow.error_indicators(), config.watchdog_poll);
        let executor = OperationExecutor::new(
            config.retry_policy.clone(),
            watchdog,
            driver.clone(),
            cancel.clone(),
        );
        let session_executor = OperationExecutor::new(
            config.retry_policy.clone(),
            ErrorWatchdog::new(Vec::new(), config.watchdog_poll),
            driver,
            cancel.clone(),
        );
        Self {
            config,
            workflow,
            executor,
            session_executor,
            store,
            cancel,
        }
    }

    /// Publish every entity, retrying failed ones until they succeed or run
    /// out of attempts.
    ///
    /// Fails only if a session cannot be set up or the final disposition
    /// cannot be stored; per-item failures are reported in the [`RunReport`].
    pub async fn run(&self, entities: Vec<E>) -> Result<RunReport, PipelineError> {
        let mut queue: VecDeque<WorkItem<E>> = entities
            .into_iter()
            .map(|entity| WorkItem::new(entity, self.config.max_failures))
            .collect();
        let mut report = RunReport::default();
        let mut session_open = false;

        info!("Publishing {} items", queue.len());

        while let Some(mut item) = queue.pop_front() {
            if self.cancel.is_cancelled() {
                queue.push_front(item);
                break;
            }

            if !session_open || !self.executor.driver().session_alive().await {
                match self.setup_session().await {
                    Ok(()) => session_open = true,
                    Err(e) if e.is_cancelled() => {
                        queue.push_front(item);
                        break;
                    }
                    Err(e) => {
                        error!("Session setup failed, aborting run: {}", e);
                        return Err(PipelineError::SessionSetup(e));
                    }
                }
            }

            item.begin();
            info!(
                "Publishing {} (attempt {})",
                item.key(),
                item.failure_count() + 1
            );

            let failure = match self.publish(&item).await {
                Ok(()) => {
                    item.complete();
                    self.store.mark_done(item.key()).await?;
                    metrics::record_work_item("done");
                    info!("Published {}", item.key());
                    report.succeeded.push(item.key().to_string());
                    continue;
                }
                Err(failure) => failure,
            };

            if failure.draft_opened {
                self.discard_draft(&item).await;
            }
            self.teardown_session().await;
            session_open = false;

            if failure.error.is_cancelled() {
                item.release();
                queue.push_front(item);
                break;
            }

            let state = if failure.error.kind.is_validation() {
                item.reject()
            } else {
                item.record_failure()
            };

            match state {
                WorkItemState::PermanentlyFailed => {
                    error!(
                        "{} permanently failed after {} attempts (last step {}): {}",
                        item.key(),
                        item.failure_count(),
                        failure.step.name(),
                        failure.error
                    );
                    let reason = match &failure.error.kind {
                        ErrorKind::Validation { field, limit } => format!(
                            "{} (field {}, limit {})",
                            failure.error,
                            field,
                            limit.as_deref().unwrap_or("none")
                        ),
                        _ => failure.error.to_string(),
                    };
                    self.store.mark_failed(item.key(), &reason).await?;
                    metrics::record_work_item("permanently_failed");
                    report.permanently_failed.push(FailedItem {
                        key: item.key().to_string(),
                        failures: item.failure_count(),
                        step: failure.step.name().to_string(),
                        kind: failure.error.kind,
                        last_error: reason,
                    });
                }
                _ => {
                    warn!(
                        "{} failed at {} ({} of {} failures), retrying later: {}",
                        item.key(),
                        failure.step.name(),
                        item.failure_count(),
                        self.config.max_failures,
                        failure.error
                    );
                    metrics::record_work_item("retried");
                    queue.push_back(item);

                    tokio::select! {
                        _ = tokio::time::sleep(self.config.cooldown) => {}
                        _ = self.cancel.cancelled() => break,
                    }
                }
            }
        }

        if session_open {
            self.teardown_session().await;
        }

        report.remaining = queue.len();
        info!(
            "Publish run finished: {} succeeded, {} permanently failed, {} remaining",
            report.succeeded.len(),
            report.permanently_failed.len(),
            report.remaining
        );
        Ok(report)
    }

    async fn setup_session(&self) -> Result<(), StepError> {
        let workflow = self.workflow.as_ref();
        let driver = self.session_executor.driver();
        debug!("Setting up automation session");
        self.session_executor
            .execute(
                "setup_session",
                move || workflow.setup_session(driver),
                self.config.step_max_retries,
            )
            .await
    }

    async fn publish(&self, item: &WorkItem<E>) -> Result<(), StepFailure> {
        let workflow = self.workflow.as_ref();
        let driver = self.executor.driver();
        let entity = &item.entity;

        for step in WorkflowStep::ALL {
            let result = self
                .executor
                .execute(
                    step.name(),
                    move || workflow.run_step(step, entity, driver),
                    self.config.step_max_retries,
                )
                .await;

            match result {
                Ok(()) => debug!("{}: {} done", item.key(), step.name()),
                Err(e) if step.is_optional() && e.kind == ErrorKind::ResourceExhausted => {
                    warn!(
                        "{}: limit reached during {}, skipping it: {}",
                        item.key(),
                        step.name(),
                        e
                    );
                }
                Err(error) => {
                    return Err(StepFailure {
                        step,
                        error,
                        draft_opened: step != WorkflowStep::Navigate,
                    })
                }
            }
        }
        Ok(())
    }

    async fn discard_draft(&self, item: &WorkItem<E>) {
        if let Err(e) = self
            .workflow
            .discard_draft(&item.entity, self.executor.driver())
            .await
        {
            warn!("Failed to discard draft for {}: {}", item.key(), e);
        }
    }

    async fn teardown_session(&self) {
        if let Err(e) = self.executor.driver().close_session().await {
            warn!("Failed to close automation session: {}", e);
        }
    }
}
