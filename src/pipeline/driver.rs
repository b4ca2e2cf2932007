//! Browser/UI automation seam.

use std::path::PathBuf;

use async_trait::async_trait;

use super::error::StepError;

/// What to do with a named element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementAction {
    Click,
    Fill(String),
    Upload(Vec<PathBuf>),
    Select(String),
}

/// Drives one remote editing session.
///
/// Implementations classify their own failures into [`StepError`] kinds.
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    async fn open_session(&self) -> Result<(), StepError>;

    async fn close_session(&self) -> Result<(), StepError>;

    /// Whether the current session is still usable.
    async fn session_alive(&self) -> bool;

    /// Load `url`, retrying transport failures up to `max_attempts` times.
    async fn navigate(&self, url: &str, max_attempts: u32) -> Result<(), StepError>;

    async fn interact(&self, element: &str, action: ElementAction) -> Result<(), StepError>;

    /// Whether the named error indicator is currently shown.
    async fn indicator_visible(&self, indicator: &str) -> Result<bool, StepError>;
}
