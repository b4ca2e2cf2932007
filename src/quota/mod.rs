//! Quota resource registry.
//!
//! Decides which AI backend may take the next request, based on persisted
//! per-minute and per-day sliding windows.

mod registry;
mod store;

pub use registry::{QuotaError, QuotaRegistry, QuotaResourceConfig, QuotaResourceStatus};
pub use store::{InMemoryQuotaStateStore, JsonQuotaStateStore, QuotaState, QuotaStateStore};
