//! Runs one workflow step with watchdog supervision and classified retries.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::driver::AutomationDriver;
use super::error::StepError;
use super::retry_policy::{RetryDecision, RetryPolicy};
use super::watchdog::ErrorWatchdog;
use crate::metrics;

pub struct OperationExecutor {
    policy: RetryPolicy,
    watchdog: ErrorWatchdog,
    driver: Arc<dyn AutomationDriver>,
    cancel: CancellationToken,
}

impl OperationExecutor {
    pub fn new(
        policy: RetryPolicy,
        watchdog: ErrorWatchdog,
        driver: Arc<dyn AutomationDriver>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            policy,
            watchdog,
            driver,
            cancel,
        }
    }

    pub fn driver(&self) -> &dyn AutomationDriver {
        self.driver.as_ref()
    }

    /// Run `operation` until it succeeds or fails for good.
    ///
    /// Each attempt races the operation against the error watchdog and the
    /// cancellation token; whichever finishes first decides the attempt and
    /// the others are dropped. At most `max_retries` retries follow the first
    /// attempt.
    pub async fn execute<T, F, Fut>(
        &self,
        name: &str,
        mut operation: F,
        max_retries: u32,
    ) -> Result<T, StepError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StepError>>,
    {
        let mut retry = 0u32;
        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(StepError::cancelled()),
                err = self.watchdog.watch(self.driver.as_ref()) => Err(err),
                result = operation() => result,
            };

            let err = match result {
                Ok(value) => {
                    if retry > 0 {
                        debug!("Step {} succeeded after {} retries", name, retry);
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let delay = match self.policy.decide(&err.kind, retry) {
                RetryDecision::Propagate => return Err(err),
                RetryDecision::RetryAfter(delay) => delay,
            };

            if retry >= max_retries {
                error!(
                    "Step {} failed after {} attempts: {}",
                    name,
                    retry + 1,
                    err
                );
                return Err(err);
            }

            retry += 1;
            metrics::record_step_retry(name, err.kind.as_str());
            warn!(
                "Step {} failed (retry {}/{} in {:?}): {}",
                name, retry, max_retries, delay, err
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => return Err(StepError::cancelled()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::driver::ElementAction;
    use crate::pipeline::error::ErrorKind;
    use crate::pipeline::watchdog::WatchedIndicator;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    /// Driver whose only behavior is an error banner that can be switched on.
    #[derive(Default)]
    struct BannerDriver {
        banner: AtomicBool,
    }

    #[async_trait]
    impl AutomationDriver for BannerDriver {
        async fn open_session(&self) -> Result<(), StepError> {
            Ok(())
        }
        async fn close_session(&self) -> Result<(), StepError> {
            Ok(())
        }
        async fn session_alive(&self) -> bool {
            true
        }
        async fn navigate(&self, _url: &str, _max_attempts: u32) -> Result<(), StepError> {
            Ok(())
        }
        async fn interact(&self, _element: &str, _action: ElementAction) -> Result<(), StepError> {
            Ok(())
        }
        async fn indicator_visible(&self, indicator: &str) -> Result<bool, StepError> {
            Ok(indicator == "server-error" && self.banner.load(Ordering::SeqCst))
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            fixed_backoff: Duration::from_millis(1),
        }
    }

    fn executor(driver: Arc<BannerDriver>) -> OperationExecutor {
        let watchdog = ErrorWatchdog::new(
            vec![WatchedIndicator::new(
                "server-error",
                ErrorKind::ServerTransient,
            )],
            Duration::from_millis(5),
        );
        OperationExecutor::new(fast_policy(), watchdog, driver, CancellationToken::new())
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let exec = executor(Arc::new(BannerDriver::default()));
        let calls = &AtomicU32::new(0);

        let result = exec
            .execute(
                "fill_fields",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, StepError>(42)
                },
                3,
            )
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let exec = executor(Arc::new(BannerDriver::default()));
        let calls = &AtomicU32::new(0);

        let result = exec
            .execute(
                "save_and_verify",
                move || async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(StepError::server_transient("502"))
                    } else {
                        Ok(())
                    }
                },
                3,
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let exec = executor(Arc::new(BannerDriver::default()));
        let calls = &AtomicU32::new(0);

        let result: Result<(), StepError> = exec
            .execute(
                "fill_fields",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(StepError::unclassified("element not found"))
                },
                2,
            )
            .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::Unclassified);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_limit_reached_propagates_immediately() {
        let exec = executor(Arc::new(BannerDriver::default()));
        let calls = &AtomicU32::new(0);

        let result: Result<(), StepError> = exec
            .execute(
                "upload_assets",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(StepError::resource_exhausted("upload limit"))
                },
                5,
            )
            .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::ResourceExhausted);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_validation_not_retried() {
        let exec = executor(Arc::new(BannerDriver::default()));
        let calls = &AtomicU32::new(0);

        let result: Result<(), StepError> = exec
            .execute(
                "fill_fields",
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(StepError::validation(
                        "title",
                        Some("80".to_string()),
                        "too long",
                    ))
                },
                5,
            )
            .await;

        assert!(matches!(
            result.unwrap_err().kind,
            ErrorKind::Validation { ref field, .. } if field == "title"
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_watchdog_fails_attempt_and_drops_operation() {
        let driver = Arc::new(BannerDriver::default());
        driver.banner.store(true, Ordering::SeqCst);
        let exec = executor(driver);
        let finished = &AtomicBool::new(false);

        let result: Result<(), StepError> = tokio::time::timeout(
            Duration::from_secs(5),
            exec.execute(
                "save_and_verify",
                move || async move {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    finished.store(true, Ordering::SeqCst);
                    Ok(())
                },
                1,
            ),
        )
        .await
        .expect("watchdog should end the step");

        assert_eq!(result.unwrap_err().kind, ErrorKind::ServerTransient);
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancellation_stops_retries() {
        let cancel = CancellationToken::new();
        let exec = OperationExecutor::new(
            RetryPolicy {
                fixed_backoff: Duration::from_secs(60),
                ..fast_policy()
            },
            ErrorWatchdog::new(Vec::new(), Duration::from_millis(5)),
            Arc::new(BannerDriver::default()),
            cancel.clone(),
        );

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let result: Result<(), StepError> = tokio::time::timeout(
            Duration::from_secs(5),
            exec.execute(
                "fill_fields",
                move || async move { Err(StepError::unclassified("flaky")) },
                10,
            ),
        )
        .await
        .expect("cancellation should end the backoff");

        assert!(result.unwrap_err().is_cancelled());
        canceller.await.unwrap();
    }
}
