//! Listing persistence.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::models::{ListingDisposition, Product};
use crate::content::ContentSink;
use crate::persistence::{read_json_or_default, write_json_atomic, PersistenceError};

#[derive(Debug, Error)]
pub enum ListingStoreError {
    #[error("Unknown product: {0}")]
    UnknownProduct(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("Product file write task failed: {0}")]
    WriteTask(#[from] tokio::task::JoinError),
}

/// Where final dispositions are recorded.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn mark_done(&self, key: &str) -> Result<(), ListingStoreError>;

    async fn mark_failed(&self, key: &str, reason: &str) -> Result<(), ListingStoreError>;
}

/// Products kept in one JSON file, rewritten on every change.
pub struct JsonListingStore {
    path: PathBuf,
    products: Mutex<Vec<Product>>,
}

impl JsonListingStore {
    /// Load products from `path`. A missing file yields an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ListingStoreError> {
        let path = path.into();
        let products: Vec<Product> = read_json_or_default(&path)?;
        info!("Loaded {} products from {:?}", products.len(), path);
        Ok(Self {
            path,
            products: Mutex::new(products),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn products(&self) -> Vec<Product> {
        self.products.lock().await.clone()
    }

    pub async fn get(&self, key: &str) -> Option<Product> {
        self.products
            .lock()
            .await
            .iter()
            .find(|p| p.url == key)
            .cloned()
    }

    pub async fn set_image_paths(
        &self,
        key: &str,
        paths: Vec<PathBuf>,
    ) -> Result<(), ListingStoreError> {
        self.update(key, |product| product.image_paths = paths).await
    }

    pub async fn save(&self) -> Result<(), ListingStoreError> {
        let products = self.products.lock().await;
        self.write(&products).await
    }

    async fn update(
        &self,
        key: &str,
        change: impl FnOnce(&mut Product),
    ) -> Result<(), ListingStoreError> {
        let mut products = self.products.lock().await;
        let product = products
            .iter_mut()
            .find(|p| p.url == key)
            .ok_or_else(|| ListingStoreError::UnknownProduct(key.to_string()))?;
        change(product);
        self.write(&products).await?;
        debug!("Updated product {}", key);
        Ok(())
    }

    /// Rewrite the file on the blocking pool. Callers hold the products lock,
    /// so writes land in the order the changes were made.
    async fn write(&self, products: &[Product]) -> Result<(), ListingStoreError> {
        let path = self.path.clone();
        let snapshot = products.to_vec();
        tokio::task::spawn_blocking(move || write_json_atomic(&path, &snapshot)).await??;
        Ok(())
    }
}

#[async_trait]
impl ListingStore for JsonListingStore {
    async fn mark_done(&self, key: &str) -> Result<(), ListingStoreError> {
        self.update(key, |product| product.disposition = ListingDisposition::Done)
            .await
    }

    async fn mark_failed(&self, key: &str, reason: &str) -> Result<(), ListingStoreError> {
        let reason = reason.to_string();
        self.update(key, |product| {
            product.disposition = ListingDisposition::PermanentlyFailed { reason }
        })
        .await
    }
}

#[async_trait]
impl ContentSink for JsonListingStore {
    async fn apply_copy(&self, key: &str, copy: &str) -> anyhow::Result<()> {
        let copy = copy.to_string();
        self.update(key, |product| product.marketing_copy = Some(copy))
            .await?;
        Ok(())
    }
}
