//! Product Relay Library
//!
//! Background job orchestration for turning scraped product listings into
//! marketplace listings: a durable image download queue, quota-aware batched
//! copy generation, and a retry queue that drives an editor workflow.

pub mod clock;
pub mod config;
pub mod content;
pub mod idle_barrier;
pub mod image_queue;
pub mod ingestion;
pub mod listing;
pub mod metrics;
pub mod persistence;
pub mod pipeline;
pub mod quota;

// Re-export commonly used types for convenience
pub use content::{BatchDispatcher, OpenAiCompatibleBackend};
pub use image_queue::{DownloadQueue, HttpImageFetcher};
pub use ingestion::{Ingestion, IngestionSummary};
pub use listing::{JsonListingStore, Product};
pub use pipeline::{OperationExecutor, RetryQueue};
pub use quota::QuotaRegistry;
