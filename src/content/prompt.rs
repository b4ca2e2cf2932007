//! Batch prompt construction and response demultiplexing.
//!
//! Every item in a batch carries its key into the prompt and the model is
//! asked to echo it back next to the generated copy, so results can be matched
//! to entities regardless of the order the model returns them in.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::backend::BackendError;
use super::models::{ContentRequest, GeneratedCopy};

lazy_static! {
    /// Where a JSON array of objects (or an empty one) may start in a reply
    /// that also carries prose or code fences.
    static ref ARRAY_START: Regex = Regex::new(r"\[\s*[\{\]]").expect("valid regex");
}

const INSTRUCTIONS: &str = "\
You write marketing copy for an online product listing.
For every product below, write a persuasive description of 80 to 150 words
based only on the facts given. Do not invent specifications.

Reply with a JSON array and nothing else. Each element must be an object
{\"key\": <the product key, copied exactly>, \"copy\": <the description>}.
Include one element per product.";

#[derive(Serialize)]
struct PromptItem<'a> {
    key: &'a str,
    product: &'a str,
}

/// Build one prompt covering every request in the batch.
pub fn build_batch_prompt(requests: &[ContentRequest]) -> Result<String, BackendError> {
    let items: Vec<PromptItem> = requests
        .iter()
        .map(|r| PromptItem {
            key: &r.key,
            product: &r.context,
        })
        .collect();
    let products = serde_json::to_string_pretty(&items)
        .map_err(|e| BackendError::InvalidRequest(format!("Cannot encode batch: {}", e)))?;
    Ok(format!("{}\n\nProducts:\n{}", INSTRUCTIONS, products))
}

/// Parse a batch reply into per-key results.
///
/// Entries without a non-empty key and copy are skipped.
pub fn parse_batch_response(text: &str) -> Result<Vec<GeneratedCopy>, BackendError> {
    let mut last_error = None;
    let mut entries = None;
    // The first candidate that decodes wins; whatever follows it is ignored.
    for start in ARRAY_START.find_iter(text).map(|m| m.start()) {
        let mut stream =
            serde_json::Deserializer::from_str(&text[start..]).into_iter::<Vec<serde_json::Value>>();
        match stream.next() {
            Some(Ok(values)) => {
                entries = Some(values);
                break;
            }
            Some(Err(e)) => last_error = Some(e),
            None => {}
        }
    }

    let entries = match (entries, last_error) {
        (Some(entries), _) => entries,
        (None, Some(e)) => {
            return Err(BackendError::InvalidResponse(format!(
                "Malformed batch reply: {}",
                e
            )))
        }
        (None, None) => {
            return Err(BackendError::InvalidResponse(
                "No JSON array in reply".to_string(),
            ))
        }
    };

    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            let key = entry.get("key")?.as_str()?.trim();
            let copy = entry.get("copy")?.as_str()?.trim();
            if key.is_empty() || copy.is_empty() {
                return None;
            }
            Some(GeneratedCopy {
                key: key.to_string(),
                copy: copy.to_string(),
            })
        })
        .collect())
}
