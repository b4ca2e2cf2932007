//! Vendor-specific editor workflow.

use async_trait::async_trait;

use super::driver::AutomationDriver;
use super::error::StepError;
use super::watchdog::WatchedIndicator;
use super::work_item::WorkEntity;

/// Ordered steps that publish one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowStep {
    Navigate,
    FillFields,
    FillRichContent,
    UploadAssets,
    FillMetadata,
    SaveAndVerify,
}

impl WorkflowStep {
    pub const ALL: [WorkflowStep; 6] = [
        WorkflowStep::Navigate,
        WorkflowStep::FillFields,
        WorkflowStep::FillRichContent,
        WorkflowStep::UploadAssets,
        WorkflowStep::FillMetadata,
        WorkflowStep::SaveAndVerify,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WorkflowStep::Navigate => "navigate",
            WorkflowStep::FillFields => "fill_fields",
            WorkflowStep::FillRichContent => "fill_rich_content",
            WorkflowStep::UploadAssets => "upload_assets",
            WorkflowStep::FillMetadata => "fill_metadata",
            WorkflowStep::SaveAndVerify => "save_and_verify",
        }
    }

    /// Whether hitting a limit here skips the step instead of failing the item.
    pub fn is_optional(&self) -> bool {
        matches!(self, WorkflowStep::UploadAssets)
    }
}

/// What each step means for one vendor's editor.
#[async_trait]
pub trait EditorWorkflow<E: WorkEntity>: Send + Sync {
    /// Error banners the watchdog should look for while steps run.
    fn error_indicators(&self) -> Vec<WatchedIndicator> {
        Vec::new()
    }

    /// Bring up a fresh session (log in, land on the dashboard...).
    async fn setup_session(&self, driver: &dyn AutomationDriver) -> Result<(), StepError> {
        driver.open_session().await
    }

    async fn run_step(
        &self,
        step: WorkflowStep,
        entity: &E,
        driver: &dyn AutomationDriver,
    ) -> Result<(), StepError>;

    /// Throw away a half-filled draft after a failure.
    async fn discard_draft(&self, entity: &E, driver: &dyn AutomationDriver)
        -> Result<(), StepError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_order_and_names() {
        let names: Vec<&str> = WorkflowStep::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "navigate",
                "fill_fields",
                "fill_rich_content",
                "upload_assets",
                "fill_metadata",
                "save_and_verify"
            ]
        );
        assert!(WorkflowStep::UploadAssets.is_optional());
        assert!(!WorkflowStep::SaveAndVerify.is_optional());
    }
}
