//! Helpers for constructing and hashing corpus chunk payloads.

use crate::qdrant::types::ChunkMetadata;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Build the payload object stored alongside each indexed chunk.
pub(crate) fn build_payload(
    text: &str,
    timestamp_rfc3339: &str,
    chunk_hash: &str,
    metadata: &ChunkMetadata,
) -> Value {
    let mut payload = Map::new();
    payload.insert("text".into(), Value::String(text.to_string()));
    payload.insert(
        "source_book".into(),
        Value::String(metadata.source_book.clone()),
    );
    payload.insert(
        "content_type".into(),
        Value::String(metadata.content_type.clone()),
    );
    payload.insert("chunk_hash".into(), Value::String(chunk_hash.to_string()));
    payload.insert(
        "timestamp".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    Value::Object(payload)
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Stable point id for the `index`-th chunk of a book section.
///
/// Re-ingesting the same book overwrites its points instead of duplicating them.
pub fn chunk_point_id(source_book: &str, content_type: &str, index: usize) -> String {
    let name = format!("{source_book}_{content_type}_{index}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
