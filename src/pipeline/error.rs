//! Error classification for workflow steps.

use serde::Serialize;
use thiserror::Error;

/// How a step failure should be treated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Local or network I/O hiccup.
    TransientIo,
    /// The remote side reports a usage limit (listing cap, upload quota...).
    ResourceExhausted,
    /// The remote side reports a temporary server problem.
    ServerTransient,
    /// Input was rejected for a specific field.
    Validation { field: String, limit: Option<String> },
    /// The automation session is gone and must be rebuilt.
    SessionFatal,
    /// Retrying will never help.
    PermanentFailure,
    /// Anything not recognized.
    Unclassified,
    /// The run is shutting down.
    Cancelled,
}

impl ErrorKind {
    /// Short label for logs and metrics.
    pub fn is_validation(&self) -> bool {
        matches!(self, ErrorKind::Validation { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::TransientIo => "transient_io",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::ServerTransient => "server_transient",
            ErrorKind::Validation { .. } => "validation",
            ErrorKind::SessionFatal => "session_fatal",
            ErrorKind::PermanentFailure => "permanent_failure",
            ErrorKind::Unclassified => "unclassified",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

/// A classified step failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{} error: {message}", .kind.as_str())]
pub struct StepError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StepError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transient_io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientIo, message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceExhausted, message)
    }

    pub fn server_transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServerTransient, message)
    }

    pub fn validation(
        field: impl Into<String>,
        limit: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorKind::Validation {
                field: field.into(),
                limit,
            },
            message,
        )
    }

    pub fn session_fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SessionFatal, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermanentFailure, message)
    }

    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unclassified, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

/// Errors that stop a whole run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Session setup failed: {0}")]
    SessionSetup(StepError),

    #[error("Listing store error: {0}")]
    Store(#[from] crate::listing::ListingStoreError),
}

/// An item that ran out of attempts or was rejected outright.
///
/// `kind` keeps the classification of the last failure, including the field
/// and limit of a validation rejection, so callers can decide between fixing
/// the data and manual review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    pub key: String,
    pub failures: u32,
    /// Step that failed last.
    pub step: String,
    pub kind: ErrorKind,
    pub last_error: String,
}
