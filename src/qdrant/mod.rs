//! Qdrant vector store integration backing the textbook corpus.

pub mod client;
pub mod filters;
pub mod payload;
/// Streaming helpers for Qdrant scroll pagination.
pub mod scroller;
pub mod types;

pub use client::QdrantService;
pub use filters::{accumulate_source_book, build_section_filter};
pub use payload::{chunk_point_id, compute_chunk_hash};
pub use types::{ChunkMetadata, ChunkPoint, QdrantError, ScoredPoint};
