//! Test server lifecycle management
//!
//! Spawns an HTTP server on a random port that plays both external parties an
//! ingestion run talks to: an image CDN and an OpenAI-compatible chat API.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use super::constants::THROTTLED_MODEL;

#[derive(Default)]
struct ServerState {
    image_hits: Mutex<HashMap<String, usize>>,
    chat_models: Mutex<Vec<String>>,
}

/// Test server instance.
///
/// When dropped, the shutdown channel closes and the server stops.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    state: Arc<ServerState>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if the port cannot be bound.
    pub async fn spawn() -> Self {
        let state = Arc::new(ServerState::default());

        let app = Router::new()
            .route("/images/{name}", get(serve_image))
            .route("/v1/chat/completions", post(chat_completions))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn image_url(&self, name: &str) -> String {
        format!("{}/images/{}", self.base_url, name)
    }

    pub fn ai_base_url(&self) -> String {
        format!("{}/v1", self.base_url)
    }

    /// How many times an image was requested.
    pub fn image_hits(&self, name: &str) -> usize {
        self.state
            .image_hits
            .lock()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Model names of every chat request received, in order.
    pub fn chat_models(&self) -> Vec<String> {
        self.state.chat_models.lock().unwrap().clone()
    }
}

/// Images named `missing*` return 404; everything else is a small PNG.
async fn serve_image(
    State(state): State<Arc<ServerState>>,
    Path(name): Path<String>,
) -> Response {
    *state
        .image_hits
        .lock()
        .unwrap()
        .entry(name.clone())
        .or_insert(0) += 1;

    if name.starts_with("missing") {
        return StatusCode::NOT_FOUND.into_response();
    }

    let seed = name.bytes().fold(0u8, |acc, b| acc.wrapping_add(b));
    let img = image::RgbImage::from_fn(16, 16, |x, y| {
        image::Rgb([seed, (x * 16) as u8, (y * 16) as u8])
    });
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png)
        .expect("Failed to encode PNG");

    ([(header::CONTENT_TYPE, "image/png")], bytes.into_inner()).into_response()
}

/// Answers every product in the prompt, or 429 for the throttled model.
async fn chat_completions(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let model = body["model"].as_str().unwrap_or_default().to_string();
    state.chat_models.lock().unwrap().push(model.clone());

    if model == THROTTLED_MODEL {
        return (StatusCode::TOO_MANY_REQUESTS, "quota exhausted").into_response();
    }

    let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
    let products = prompt.split("Products:\n").nth(1).unwrap_or("[]");
    let items: Vec<serde_json::Value> = serde_json::from_str(products).unwrap_or_default();
    let copies: Vec<serde_json::Value> = items
        .iter()
        .map(|item| {
            serde_json::json!({
                "key": item["key"].clone(),
                "copy": format!("Generated copy for {}", item["key"].as_str().unwrap_or_default()),
            })
        })
        .collect();

    let reply = format!(
        "Here is the copy:\n```json\n{}\n```",
        serde_json::to_string_pretty(&copies).unwrap()
    );
    Json(serde_json::json!({
        "id": "chatcmpl-test",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": reply},
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}
