//! Carries the generated document through Stripe session metadata.
//!
//! Stripe caps metadata values at 500 characters and a session at 50 keys, so the base64
//! document is split across `html_0..html_{N-1}` with the count stored under `html_parts`.

use std::collections::{BTreeMap, HashMap};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

pub const METADATA_VALUE_LIMIT: usize = 500;
pub const METADATA_KEY_LIMIT: usize = 50;
pub const PARTS_KEY: &str = "html_parts";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("site payload is not valid base64")]
    InvalidBase64,
    #[error("site payload needs {parts} metadata fields but only {available} are available")]
    TooLarge { parts: usize, available: usize },
    #[error("session metadata carries no site payload")]
    Missing,
    #[error("metadata chunk html_{0} is missing")]
    MissingChunk(usize),
    #[error("reconstructed payload is not valid UTF-8 HTML")]
    Undecodable,
}

pub fn chunk_key(index: usize) -> String {
    format!("html_{index}")
}

/// Splits `payload` into pieces of at most `size` characters, in order.
pub fn chunk(payload: &str, size: usize) -> Vec<String> {
    let size = size.max(1);
    let mut parts = Vec::new();
    let mut current = String::with_capacity(size);
    let mut count = 0;
    for ch in payload.chars() {
        current.push(ch);
        count += 1;
        if count == size {
            parts.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

pub fn reconstruct<S: AsRef<str>>(parts: &[S]) -> String {
    parts.iter().map(AsRef::as_ref).collect()
}

/// Builds the `html_*` metadata entries for a base64 document.
///
/// `reserved_keys` is the number of other metadata keys the session will carry.
pub fn metadata_for_html(
    html_base64: &str,
    reserved_keys: usize,
) -> Result<BTreeMap<String, String>, ChunkError> {
    let html_base64 = html_base64.trim();
    STANDARD
        .decode(html_base64)
        .map_err(|_| ChunkError::InvalidBase64)?;

    let parts = chunk(html_base64, METADATA_VALUE_LIMIT);
    let available = METADATA_KEY_LIMIT.saturating_sub(reserved_keys + 1);
    if parts.len() > available {
        return Err(ChunkError::TooLarge {
            parts: parts.len(),
            available,
        });
    }

    let mut metadata: BTreeMap<String, String> = parts
        .into_iter()
        .enumerate()
        .map(|(index, part)| (chunk_key(index), part))
        .collect();
    let count = metadata.len();
    metadata.insert(PARTS_KEY.to_string(), count.to_string());
    Ok(metadata)
}

/// Reverses [`metadata_for_html`], returning the decoded document.
pub fn html_from_metadata(metadata: &HashMap<String, String>) -> Result<String, ChunkError> {
    let count: usize = metadata
        .get(PARTS_KEY)
        .and_then(|raw| raw.trim().parse().ok())
        .ok_or(ChunkError::Missing)?;

    let parts = (0..count)
        .map(|index| {
            metadata
                .get(&chunk_key(index))
                .map(String::as_str)
                .ok_or(ChunkError::MissingChunk(index))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let encoded = reconstruct(&parts);
    if encoded.is_empty() {
        return Err(ChunkError::Missing);
    }
    let bytes = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|_| ChunkError::Undecodable)?;
    String::from_utf8(bytes).map_err(|_| ChunkError::Undecodable)
}

pub fn encode_html(html: &str) -> String {
    STANDARD.encode(html.as_bytes())
}
