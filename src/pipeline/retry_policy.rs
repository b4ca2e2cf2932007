//! Retry policy for workflow steps.
//!
//! Server-side hiccups back off exponentially with the attempt number;
//! unrecognized failures get a short fixed pause. Limits, validation errors
//! and dead sessions are never retried at the step level.

use std::time::Duration;

use super::error::ErrorKind;

/// What the executor should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the given pause.
    RetryAfter(Duration),
    /// Surface the error right away.
    Propagate,
}

/// Backoff parameters for step retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Backoff before the first retry of a server-transient failure.
    pub initial_backoff: Duration,
    /// Cap for exponential growth.
    pub max_backoff: Duration,
    /// Multiplier applied per attempt.
    pub backoff_multiplier: f64,
    /// Pause used for unclassified and I/O failures.
    pub fixed_backoff: Duration,
}

impl RetryPolicy {
    /// Exponential backoff for the given zero-based retry number, capped at
    /// `max_backoff`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let capped = secs.min(self.max_backoff.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }

    /// Decide how to handle a failure of the given kind on a zero-based retry.
    pub fn decide(&self, kind: &ErrorKind, retry: u32) -> RetryDecision {
        match kind {
            ErrorKind::ServerTransient => RetryDecision::RetryAfter(self.backoff_for(retry)),
            ErrorKind::Unclassified | ErrorKind::TransientIo => {
                RetryDecision::RetryAfter(self.fixed_backoff)
            }
            ErrorKind::ResourceExhausted
            | ErrorKind::Validation { .. }
            | ErrorKind::SessionFatal
            | ErrorKind::PermanentFailure
            | ErrorKind::Cancelled => RetryDecision::Propagate,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            fixed_backoff: Duration::from_secs(1),
        }
    }
}
