//! Prometheus metrics for the background queues.

use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};

/// Metric name prefix for all product-relay metrics
const PREFIX: &str = "product_relay";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Image download queue
    pub static ref IMAGE_DOWNLOADS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_image_downloads_total"), "Image download jobs by outcome"),
        &["outcome"]
    ).expect("Failed to create image_downloads_total metric");

    pub static ref QUEUE_DEPTH: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_queue_depth"), "Items waiting or running per queue"),
        &["queue", "state"]
    ).expect("Failed to create queue_depth metric");

    // AI content generation
    pub static ref AI_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_ai_requests_total"), "Backend calls by resource and outcome"),
        &["resource", "outcome"]
    ).expect("Failed to create ai_requests_total metric");

    pub static ref CONTENT_ITEMS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_content_items_total"), "Content requests by outcome"),
        &["outcome"]
    ).expect("Failed to create content_items_total metric");

    // Editor pipeline
    pub static ref WORK_ITEMS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_work_items_total"), "Work item attempts by outcome"),
        &["outcome"]
    ).expect("Failed to create work_items_total metric");

    pub static ref STEP_RETRIES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_step_retries_total"), "Step retries by step and error kind"),
        &["step", "kind"]
    ).expect("Failed to create step_retries_total metric");
}

/// Initialize and register all metrics
pub fn init_metrics() {
    // Ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(IMAGE_DOWNLOADS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(QUEUE_DEPTH.clone()));
    let _ = REGISTRY.register(Box::new(AI_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CONTENT_ITEMS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(WORK_ITEMS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(STEP_RETRIES_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

pub fn record_image_download(outcome: &str) {
    IMAGE_DOWNLOADS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn set_queue_depth(queue: &str, pending: usize, in_flight: usize) {
    QUEUE_DEPTH
        .with_label_values(&[queue, "pending"])
        .set(pending as f64);
    QUEUE_DEPTH
        .with_label_values(&[queue, "in_flight"])
        .set(in_flight as f64);
}

pub fn record_ai_request(resource: &str, outcome: &str) {
    AI_REQUESTS_TOTAL
        .with_label_values(&[resource, outcome])
        .inc();
}

pub fn record_content_items(outcome: &str, count: usize) {
    CONTENT_ITEMS_TOTAL
        .with_label_values(&[outcome])
        .inc_by(count as f64);
}

pub fn record_work_item(outcome: &str) {
    WORK_ITEMS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_step_retry(step: &str, kind: &str) {
    STEP_RETRIES_TOTAL.with_label_values(&[step, kind]).inc();
}

/// Render all registered metrics in the Prometheus text format.
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_includes_recorded_metrics() {
        init_metrics();
        record_image_download("completed");
        record_ai_request("primary", "ok");
        set_queue_depth("images", 3, 1);

        let text = gather_metrics().unwrap();
        assert!(text.contains("product_relay_image_downloads_total"));
        assert!(text.contains("product_relay_ai_requests_total"));
        assert!(text.contains("product_relay_queue_depth"));
    }
}
