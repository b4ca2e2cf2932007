//! Image download queue.
//!
//! Durable, deduplicating, bounded-concurrency queue that fetches product
//! images into a media folder and shrinks oversized ones.

mod fetcher;
mod models;
mod post_process;
mod queue;
mod queue_store;

pub use fetcher::{HttpImageFetcher, ImageFetcher};
pub use models::*;
pub use post_process::{
    ImagePostProcessor, NoOpPostProcessor, PostProcessOutcome, SizeCeilingProcessor,
};
pub use queue::{DownloadQueue, DownloadQueueConfig};
pub use queue_store::{DownloadQueueStore, JsonDownloadQueueStore, NullDownloadQueueStore};
