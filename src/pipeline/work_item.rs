//! Work items tracked by the retry queue.

use serde::Serialize;

/// Something the retry queue can push through the workflow.
pub trait WorkEntity: Send + Sync + 'static {
    /// Stable identity, used for logs and the final disposition.
    fn key(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkItemState {
    Pending,
    InProgress,
    Done,
    PermanentlyFailed,
}

/// An entity plus its failure bookkeeping.
#[derive(Debug, Clone)]
pub struct WorkItem<E> {
    pub entity: E,
    failure_count: u32,
    max_failures: u32,
    state: WorkItemState,
}

impl<E: WorkEntity> WorkItem<E> {
    pub fn new(entity: E, max_failures: u32) -> Self {
        Self {
            entity,
            failure_count: 0,
            max_failures: max_failures.max(1),
            state: WorkItemState::Pending,
        }
    }

    pub fn key(&self) -> &str {
        self.entity.key()
    }

    pub fn state(&self) -> WorkItemState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn begin(&mut self) {
        self.state = WorkItemState::InProgress;
    }

    pub fn complete(&mut self) {
        self.state = WorkItemState::Done;
    }

    /// Count a failure and move to `Pending` or, at the limit, `PermanentlyFailed`.
    pub fn record_failure(&mut self) -> WorkItemState {
        self.failure_count += 1;
        self.state = if self.failure_count >= self.max_failures {
            WorkItemState::PermanentlyFailed
        } else {
            WorkItemState::Pending
        };
        self.state
    }

    /// Count a failure that no retry can fix and give up on the item.
    pub fn reject(&mut self) -> WorkItemState {
        self.failure_count += 1;
        self.state = WorkItemState::PermanentlyFailed;
        self.state
    }

    /// Put an interrupted item back without counting a failure.
    pub fn release(&mut self) {
        self.state = WorkItemState::Pending;
    }
}
