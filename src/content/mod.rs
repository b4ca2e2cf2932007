//! Batched marketing-copy generation against quota-limited AI backends.

mod backend;
mod dispatcher;
mod models;
mod openai;
mod prompt;

pub use backend::{AiBackend, BackendError};
pub use dispatcher::{BatchDispatcher, ContentSink, DispatcherConfig};
pub use models::{ContentRequest, DispatcherStats, GeneratedCopy};
pub use openai::OpenAiCompatibleBackend;
pub use prompt::{build_batch_prompt, parse_batch_response};
