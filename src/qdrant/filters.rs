//! Filter helpers for corpus sections and payload accumulation.

use std::collections::BTreeSet;

use serde_json::{Map, Value, json};

use super::types::ChunkMetadata;

/// Filter matching every point of one book section.
pub fn build_section_filter(metadata: &ChunkMetadata) -> Value {
    json!({
        "must": [
            { "key": "source_book", "match": { "value": metadata.source_book } },
            { "key": "content_type", "match": { "value": metadata.content_type } }
        ]
    })
}

/// Accumulate the `source_book` value of a payload into a sorted set.
pub fn accumulate_source_book(payload: &Map<String, Value>, books: &mut BTreeSet<String>) {
    if let Some(Value::String(book)) = payload.get("source_book") {
        let trimmed = book.trim();
        if !trimmed.is_empty() {
            books.insert(trimmed.to_string());
        }
    }
}
