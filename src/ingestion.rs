//! Ingestion run: fetch product images and generate copy for a product file.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::content::{BatchDispatcher, DispatcherStats};
use crate::image_queue::{DownloadQueue, DownloadQueueStats};
use crate::listing::{JsonListingStore, ListingDisposition};

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionSummary {
    pub products: usize,
    pub images_restored: usize,
    pub images_enqueued: usize,
    pub images: DownloadQueueStats,
    pub copy_requested: usize,
    pub copy_requeued: usize,
    pub content: Option<DispatcherStats>,
    /// Products still without copy after the run.
    pub unresolved: Vec<String>,
}

pub struct Ingestion {
    store: Arc<JsonListingStore>,
    images: Arc<DownloadQueue>,
    dispatcher: Option<Arc<BatchDispatcher>>,
    media_dir: PathBuf,
    requeue_unresolved: bool,
}

impl Ingestion {
    pub fn new(
        store: Arc<JsonListingStore>,
        images: Arc<DownloadQueue>,
        dispatcher: Option<Arc<BatchDispatcher>>,
        media_dir: PathBuf,
        requeue_unresolved: bool,
    ) -> Self {
        Self {
            store,
            images,
            dispatcher,
            media_dir,
            requeue_unresolved,
        }
    }

    /// Queue every image and copy request, then wait for both queues to drain.
    pub async fn run(&self) -> Result<IngestionSummary> {
        tokio::fs::create_dir_all(&self.media_dir)
            .await
            .with_context(|| format!("Failed to create media dir {:?}", self.media_dir))?;

        let mut summary = IngestionSummary {
            images_restored: self
                .images
                .start()
                .context("Failed to restore image queue")?,
            ..Default::default()
        };

        let products = self.store.products().await;
        summary.products = products.len();
        info!("Ingesting {} products", products.len());

        for product in &products {
            let paths: Vec<PathBuf> = product
                .image_urls
                .iter()
                .map(|url| self.images.enqueue(url, &self.media_dir))
                .collect();
            summary.images_enqueued += paths.len();
            if paths != product.image_paths {
                self.store
                    .set_image_paths(&product.url, paths)
                    .await
                    .with_context(|| format!("Failed to record images for {}", product.url))?;
            }
        }

        if let Some(dispatcher) = &self.dispatcher {
            for product in products.iter().filter(|p| {
                p.marketing_copy.is_none() && p.disposition == ListingDisposition::Pending
            }) {
                if dispatcher.enqueue(product.content_request()) {
                    summary.copy_requested += 1;
                }
            }
            info!("Requested copy for {} products", summary.copy_requested);
        }

        self.wait_for_idle().await;

        if let Some(dispatcher) = &self.dispatcher {
            let unresolved = dispatcher.take_unresolved();
            if self.requeue_unresolved && !unresolved.is_empty() {
                info!("Re-queueing {} products without copy", unresolved.len());
                for request in unresolved {
                    if dispatcher.enqueue(request) {
                        summary.copy_requeued += 1;
                    }
                }
                dispatcher.wait_for_idle().await;
                summary.unresolved = keys(dispatcher.take_unresolved());
            } else {
                summary.unresolved = keys(unresolved);
            }
            if !summary.unresolved.is_empty() {
                warn!(
                    "{} products are still without copy",
                    summary.unresolved.len()
                );
            }
            summary.content = Some(dispatcher.stats());
        }

        summary.images = self.images.stats();
        Ok(summary)
    }

    /// Wait until both the image queue and the dispatcher are idle.
    pub async fn wait_for_idle(&self) {
        let content_idle = async {
            if let Some(dispatcher) = &self.dispatcher {
                dispatcher.wait_for_idle().await;
            }
        };
        futures::future::join(self.images.wait_for_idle(), content_idle).await;
    }

    /// Stop both queues and flush their state.
    pub async fn shutdown(&self) -> Result<()> {
        self.images
            .shutdown()
            .await
            .context("Failed to persist image queue")?;
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher
                .shutdown()
                .await
                .context("Failed to persist quota state")?;
        }
        self.store
            .save()
            .await
            .context("Failed to save product file")?;
        Ok(())
    }
}

fn keys(requests: Vec<crate::content::ContentRequest>) -> Vec<String> {
    requests.into_iter().map(|r| r.key).collect()
}
