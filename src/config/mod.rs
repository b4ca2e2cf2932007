mod file_config;

pub use file_config::{ContentConfig, FileConfig, ImageQueueConfig, PipelineConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::content::DispatcherConfig;
use crate::image_queue::DownloadQueueConfig;
use crate::pipeline::{RetryPolicy, RetryQueueConfig};
use crate::quota::QuotaResourceConfig;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub media_dir: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub generate_copy: bool,
    pub parallelism: Option<usize>,
    pub ai_base_url: Option<String>,
    pub metrics_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub media_dir: PathBuf,
    pub state_dir: PathBuf,
    pub generate_copy: bool,
    pub metrics_file: Option<PathBuf>,

    // Feature configs (with defaults)
    pub image_queue: ImageQueueSettings,
    pub content: ContentSettings,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone)]
pub struct ImageQueueSettings {
    pub parallelism: usize,
    pub max_image_bytes: u64,
    pub max_shrink_cycles: u32,
    pub request_timeout_secs: u64,
    pub retry_delay_millis: u64,
    pub max_attempts: Option<u32>,
    pub persist_interval_secs: u64,
    pub queue_file: PathBuf,
}

impl ImageQueueSettings {
    pub fn queue_config(&self) -> DownloadQueueConfig {
        DownloadQueueConfig {
            parallelism: self.parallelism,
            retry_delay: Duration::from_millis(self.retry_delay_millis),
            max_attempts: self.max_attempts,
            persist_interval: Duration::from_secs(self.persist_interval_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub batch_size: usize,
    pub max_attempts: u32,
    pub poll_interval_secs: u64,
    pub exhausted_wait_secs: u64,
    pub request_timeout_secs: u64,
    pub state_file: PathBuf,
    pub base_url: String,
    pub api_key: Option<String>,
    pub requeue_unresolved: bool,
    pub resources: Vec<QuotaResourceConfig>,
}

impl ContentSettings {
    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            batch_size: self.batch_size,
            max_attempts: self.max_attempts,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            exhausted_wait: Duration::from_secs(self.exhausted_wait_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_failures: u32,
    pub step_max_retries: u32,
    pub cooldown_secs: u64,
    pub watchdog_poll_millis: u64,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub backoff_multiplier: f64,
    pub fixed_backoff_millis: u64,
}

impl PipelineSettings {
    pub fn retry_queue_config(&self) -> RetryQueueConfig {
        RetryQueueConfig {
            max_failures: self.max_failures,
            step_max_retries: self.step_max_retries,
            cooldown: Duration::from_secs(self.cooldown_secs),
            retry_policy: RetryPolicy {
                initial_backoff: Duration::from_secs(self.initial_backoff_secs),
                max_backoff: Duration::from_secs(self.max_backoff_secs),
                backoff_multiplier: self.backoff_multiplier,
                fixed_backoff: Duration::from_millis(self.fixed_backoff_millis),
            },
            watchdog_poll: Duration::from_millis(self.watchdog_poll_millis),
        }
    }
}

const DEFAULT_AI_BASE_URL: &str = "https://api.openai.com/v1";

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let media_dir = file
            .media_dir
            .map(PathBuf::from)
            .or_else(|| cli.media_dir.clone())
            .unwrap_or_else(|| PathBuf::from("media"));
        let state_dir = file
            .state_dir
            .map(PathBuf::from)
            .or_else(|| cli.state_dir.clone())
            .unwrap_or_else(|| PathBuf::from(".relay-state"));

        if media_dir.exists() && !media_dir.is_dir() {
            bail!("media_dir is not a directory: {:?}", media_dir);
        }
        if state_dir.exists() && !state_dir.is_dir() {
            bail!("state_dir is not a directory: {:?}", state_dir);
        }

        let generate_copy = file.generate_copy.unwrap_or(cli.generate_copy);
        let metrics_file = file
            .metrics_file
            .map(PathBuf::from)
            .or_else(|| cli.metrics_file.clone());

        // Image queue settings - merge file config with defaults
        let iq_file = file.image_queue.unwrap_or_default();
        let image_queue = ImageQueueSettings {
            parallelism: iq_file.parallelism.or(cli.parallelism).unwrap_or(8),
            max_image_bytes: iq_file.max_image_bytes.unwrap_or(1024 * 1024),
            max_shrink_cycles: iq_file.max_shrink_cycles.unwrap_or(4),
            request_timeout_secs: iq_file.request_timeout_secs.unwrap_or(30),
            retry_delay_millis: iq_file.retry_delay_millis.unwrap_or(500),
            max_attempts: iq_file.max_attempts,
            persist_interval_secs: iq_file.persist_interval_secs.unwrap_or(5),
            queue_file: iq_file
                .queue_file
                .map(PathBuf::from)
                .unwrap_or_else(|| state_dir.join("image_queue.json")),
        };
        if image_queue.parallelism == 0 {
            bail!("image_queue.parallelism must be at least 1");
        }

        let content_file = file.content.unwrap_or_default();
        let content = ContentSettings {
            batch_size: content_file.batch_size.unwrap_or(10),
            max_attempts: content_file.max_attempts.unwrap_or(5),
            poll_interval_secs: content_file.poll_interval_secs.unwrap_or(2),
            exhausted_wait_secs: content_file.exhausted_wait_secs.unwrap_or(10),
            request_timeout_secs: content_file.request_timeout_secs.unwrap_or(120),
            state_file: content_file
                .state_file
                .map(PathBuf::from)
                .unwrap_or_else(|| state_dir.join("quota_state.json")),
            base_url: content_file
                .base_url
                .or_else(|| cli.ai_base_url.clone())
                .unwrap_or_else(|| DEFAULT_AI_BASE_URL.to_string()),
            api_key: content_file.api_key,
            requeue_unresolved: content_file.requeue_unresolved.unwrap_or(true),
            resources: content_file.resources,
        };
        if content.batch_size == 0 {
            bail!("content.batch_size must be at least 1");
        }
        if generate_copy && content.resources.is_empty() {
            bail!("Copy generation needs at least one [[content.resources]] entry");
        }

        let pipeline_file = file.pipeline.unwrap_or_default();
        let pipeline = PipelineSettings {
            max_failures: pipeline_file.max_failures.unwrap_or(3),
            step_max_retries: pipeline_file.step_max_retries.unwrap_or(3),
            cooldown_secs: pipeline_file.cooldown_secs.unwrap_or(30),
            watchdog_poll_millis: pipeline_file.watchdog_poll_millis.unwrap_or(500),
            initial_backoff_secs: pipeline_file.initial_backoff_secs.unwrap_or(2),
            max_backoff_secs: pipeline_file.max_backoff_secs.unwrap_or(60),
            backoff_multiplier: pipeline_file.backoff_multiplier.unwrap_or(2.0),
            fixed_backoff_millis: pipeline_file.fixed_backoff_millis.unwrap_or(1000),
        };

        Ok(Self {
            media_dir,
            state_dir,
            generate_copy,
            metrics_file,
            image_queue,
            content,
            pipeline,
        })
    }
}
