use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::content::ContentRequest;
use crate::pipeline::WorkEntity;

/// Final state of a product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ListingDisposition {
    #[default]
    Pending,
    Done,
    PermanentlyFailed {
        reason: String,
    },
}

/// A product scraped from a source shop, plus what the relay adds to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Canonical product page URL; the product's identity everywhere.
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    /// Local files for `image_urls`, in the same order.
    #[serde(default)]
    pub image_paths: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing_copy: Option<String>,
    #[serde(default)]
    pub disposition: ListingDisposition,
}

impl Product {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            description: String::new(),
            image_urls: Vec::new(),
            image_paths: Vec::new(),
            marketing_copy: None,
            disposition: ListingDisposition::Pending,
        }
    }

    /// Copy-generation request for this product, keyed by its URL.
    pub fn content_request(&self) -> ContentRequest {
        let context = if self.description.trim().is_empty() {
            self.title.clone()
        } else {
            format!("{}\n\n{}", self.title, self.description.trim())
        };
        ContentRequest::new(self.url.clone(), context)
    }
}

impl WorkEntity for Product {
    fn key(&self) -> &str {
        &self.url
    }
}
