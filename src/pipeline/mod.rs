//! Publishing pipeline: a retry queue that drives each entity through a
//! vendor editor workflow, step by step, under an error watchdog.

mod driver;
mod error;
mod executor;
mod retry_policy;
mod retry_queue;
mod watchdog;
mod work_item;
mod workflow;

pub use driver::{AutomationDriver, ElementAction};
pub use error::{ErrorKind, FailedItem, PipelineError, StepError};
pub use executor::OperationExecutor;
pub use retry_policy::{RetryDecision, RetryPolicy};
pub use retry_queue::{RetryQueue, RetryQueueConfig, RunOutcome, RunReport};
pub use watchdog::{ErrorWatchdog, WatchedIndicator};
pub use work_item::{WorkEntity, WorkItem, WorkItemState};
pub use workflow::{EditorWorkflow, WorkflowStep};
