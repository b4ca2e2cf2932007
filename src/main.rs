use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use product_relay::clock::SystemClock;
use product_relay::config::{AppConfig, CliConfig, FileConfig};
use product_relay::content::{BatchDispatcher, OpenAiCompatibleBackend};
use product_relay::image_queue::{
    DownloadQueue, HttpImageFetcher, JsonDownloadQueueStore, SizeCeilingProcessor,
};
use product_relay::ingestion::{Ingestion, IngestionSummary};
use product_relay::listing::JsonListingStore;
use product_relay::metrics;
use product_relay::quota::{JsonQuotaStateStore, QuotaRegistry};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the JSON file with the products to ingest.
    #[clap(value_parser = parse_path)]
    pub products_file: PathBuf,

    /// Path to a TOML config file. Its values override command line options.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory where product images are stored.
    #[clap(long, value_parser = parse_path)]
    pub media_dir: Option<PathBuf>,

    /// Directory for queue and quota state files.
    #[clap(long, value_parser = parse_path)]
    pub state_dir: Option<PathBuf>,

    /// Also generate marketing copy for products that have none.
    #[clap(long)]
    pub generate_copy: bool,

    /// Maximum concurrent image downloads.
    #[clap(long)]
    pub parallelism: Option<usize>,

    /// Base URL of the OpenAI-compatible API used for copy generation.
    #[clap(long)]
    pub ai_base_url: Option<String>,

    /// Write Prometheus metrics to this file when the run ends.
    #[clap(long, value_parser = parse_path)]
    pub metrics_file: Option<PathBuf>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            media_dir: self.media_dir.clone(),
            state_dir: self.state_dir.clone(),
            generate_copy: self.generate_copy,
            parallelism: self.parallelism,
            ai_base_url: self.ai_base_url.clone(),
            metrics_file: self.metrics_file.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    std::fs::create_dir_all(&config.state_dir)
        .with_context(|| format!("Failed to create state dir {:?}", config.state_dir))?;

    info!("Loading products from {:?}...", cli_args.products_file);
    let store = Arc::new(JsonListingStore::load(&cli_args.products_file)?);

    let images = Arc::new(DownloadQueue::new(
        config.image_queue.queue_config(),
        Arc::new(HttpImageFetcher::new(
            config.image_queue.request_timeout_secs,
        )?),
        Arc::new(SizeCeilingProcessor::new(
            config.image_queue.max_image_bytes,
            config.image_queue.max_shrink_cycles,
        )),
        Arc::new(JsonDownloadQueueStore::new(&config.image_queue.queue_file)),
    ));

    let dispatcher = if config.generate_copy {
        let registry = Arc::new(QuotaRegistry::load(
            config.content.resources.clone(),
            Arc::new(JsonQuotaStateStore::new(&config.content.state_file)),
            Arc::new(SystemClock),
        )?);
        let backend = Arc::new(OpenAiCompatibleBackend::new(
            config.content.base_url.clone(),
            config.content.api_key.clone(),
            Duration::from_secs(config.content.request_timeout_secs),
        ));
        info!("Copy generation enabled via {}", config.content.base_url);
        Some(Arc::new(BatchDispatcher::new(
            config.content.dispatcher_config(),
            registry,
            backend,
            store.clone(),
        )))
    } else {
        None
    };

    let ingestion = Ingestion::new(
        store,
        images,
        dispatcher,
        config.media_dir.clone(),
        config.content.requeue_unresolved,
    );

    let outcome = tokio::select! {
        result = ingestion.run() => Some(result),
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, shutting down gracefully...");
            None
        }
    };

    if let Err(e) = ingestion.shutdown().await {
        error!("Shutdown did not complete cleanly: {:#}", e);
    }

    if let Some(path) = &config.metrics_file {
        match metrics::gather_metrics() {
            Ok(text) => {
                if let Err(e) = std::fs::write(path, text) {
                    error!("Failed to write metrics to {:?}: {}", path, e);
                }
            }
            Err(e) => error!("Failed to gather metrics: {}", e),
        }
    }

    match outcome {
        Some(result) => {
            let summary = result?;
            print_summary(&summary);
        }
        None => info!("Run interrupted; unfinished downloads will resume next time"),
    }
    Ok(())
}

fn print_summary(summary: &IngestionSummary) {
    println!("Products:          {}", summary.products);
    println!(
        "Images:            {} downloaded, {} already present, {} failed",
        summary.images.downloaded, summary.images.already_present, summary.images.failed
    );
    if let Some(content) = &summary.content {
        println!(
            "Copy:              {} generated, {} batches ({} failed)",
            content.resolved, content.batches_sent, content.batches_failed
        );
        if summary.copy_requeued > 0 {
            println!("Copy re-queued:    {}", summary.copy_requeued);
        }
        for key in &summary.unresolved {
            println!("Without copy:      {}", key);
        }
    }
}
