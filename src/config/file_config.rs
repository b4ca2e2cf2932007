use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::quota::QuotaResourceConfig;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub media_dir: Option<String>,
    pub state_dir: Option<String>,
    pub generate_copy: Option<bool>,
    pub metrics_file: Option<String>,

    // Feature configs
    pub image_queue: Option<ImageQueueConfig>,
    pub content: Option<ContentConfig>,
    pub pipeline: Option<PipelineConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ImageQueueConfig {
    pub parallelism: Option<usize>,
    pub max_image_bytes: Option<u64>,
    pub max_shrink_cycles: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub retry_delay_millis: Option<u64>,
    pub max_attempts: Option<u32>,
    pub persist_interval_secs: Option<u64>,
    pub queue_file: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ContentConfig {
    pub batch_size: Option<usize>,
    pub max_attempts: Option<u32>,
    pub poll_interval_secs: Option<u64>,
    pub exhausted_wait_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub state_file: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub requeue_unresolved: Option<bool>,
    /// Quota resources in priority order.
    pub resources: Vec<QuotaResourceConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_failures: Option<u32>,
    pub step_max_retries: Option<u32>,
    pub cooldown_secs: Option<u64>,
    pub watchdog_poll_millis: Option<u64>,
    pub initial_backoff_secs: Option<u64>,
    pub max_backoff_secs: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub fixed_backoff_millis: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
