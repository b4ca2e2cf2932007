//! Error indicator watchdog.
//!
//! Polls the driver for vendor error banners while a step runs. Seeing one
//! fails the step with the indicator's classification, even if the step itself
//! has not returned yet.

use std::time::Duration;

use tracing::{debug, warn};

use super::driver::AutomationDriver;
use super::error::{ErrorKind, StepError};

/// An on-page error signal and how to classify it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedIndicator {
    pub name: String,
    pub kind: ErrorKind,
}

impl WatchedIndicator {
    pub fn new(name: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

pub struct ErrorWatchdog {
    indicators: Vec<WatchedIndicator>,
    poll_interval: Duration,
}

impl ErrorWatchdog {
    pub fn new(indicators: Vec<WatchedIndicator>, poll_interval: Duration) -> Self {
        Self {
            indicators,
            poll_interval,
        }
    }

    /// Resolve with the first indicator seen. Never resolves if none shows up.
    pub async fn watch(&self, driver: &dyn AutomationDriver) -> StepError {
        if self.indicators.is_empty() {
            return std::future::pending().await;
        }

        loop {
            for indicator in &self.indicators {
                match driver.indicator_visible(&indicator.name).await {
                    Ok(true) => {
                        warn!("Error indicator '{}' detected", indicator.name);
                        return StepError::new(
                            indicator.kind.clone(),
                            format!("error indicator '{}' shown", indicator.name),
                        );
                    }
                    Ok(false) => {}
                    Err(e) if e.kind == ErrorKind::SessionFatal => return e,
                    Err(e) => debug!("Could not poll indicator '{}': {}", indicator.name, e),
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
