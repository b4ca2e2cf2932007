//! Data models for the image download queue.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::persistence::PersistenceError;

/// Extensions kept as-is after normalization. Everything else becomes `jpg`.
const KNOWN_EXTENSIONS: &[&str] = &["jpg", "png", "gif", "webp", "bmp"];

/// A single image to fetch.
///
/// `destination_path` is derived from the URL, so the same URL always maps to
/// the same file and doubles as the dedup key inside the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadJob {
    pub source_url: String,
    pub destination_path: PathBuf,
}

impl DownloadJob {
    pub fn new(source_url: &str, destination_folder: &Path) -> Self {
        let file_name = format!(
            "{}.{}",
            dedup_key(source_url),
            normalized_extension(source_url)
        );
        Self {
            source_url: source_url.to_string(),
            destination_path: destination_folder.join(file_name),
        }
    }
}

/// Hex SHA-256 of the source URL.
pub fn dedup_key(source_url: &str) -> String {
    hex::encode(Sha256::digest(source_url.as_bytes()))
}

/// Extension of the URL path, lower-cased and folded onto a small known set.
pub fn normalized_extension(source_url: &str) -> &'static str {
    let path = source_url
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let last_segment = path.rsplit('/').next().unwrap_or_default();

    let ext = match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => return "jpg",
    };

    match ext.as_str() {
        "jpeg" | "jpe" | "jfif" => "jpg",
        other => KNOWN_EXTENSIONS
            .iter()
            .find(|known| **known == other)
            .copied()
            .unwrap_or("jpg"),
    }
}

/// How a finished job left the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Fetched and written.
    Downloaded,
    /// Destination already existed.
    AlreadyPresent,
}

/// Snapshot of queue counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadQueueStats {
    pub pending: usize,
    pub in_flight: usize,
    pub downloaded: u64,
    pub already_present: u64,
    pub requeued: u64,
    pub failed: u64,
}

/// Errors raised while processing a single job.
#[derive(Debug, Error)]
pub enum ImageQueueError {
    #[error("Connection error fetching {url}: {message}")]
    Connection { url: String, message: String },

    #[error("HTTP {status} fetching {url}")]
    Http { url: String, status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing failed: {0}")]
    Image(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl ImageQueueError {
    /// Missing resources are not worth refetching; everything else is.
    pub fn is_retryable(&self) -> bool {
        match self {
            ImageQueueError::Http { status, .. } => !matches!(status, 404 | 410),
            _ => true,
        }
    }
}
