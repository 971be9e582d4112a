//! Data types and errors for textbook ingestion.

use crate::embedding::EmbeddingClientError;
use crate::qdrant::QdrantError;
use anyhow::Error as TokenizerError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors produced while splitting section text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible token budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Tokenizer resources were unavailable for the configured model.
    #[error("failed to initialize tokenizer for model '{model}': {source}")]
    Tokenizer {
        /// Model whose tokenizer we attempted to load.
        model: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Errors emitted while ingesting a book.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Title or text was blank.
    #[error("Invalid book: {0}")]
    InvalidBook(String),
    /// Chunking failed for one of the sections.
    #[error("Failed to chunk book: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors.
    #[error("Failed to embed chunks: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Qdrant write or collection management failed.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
}

impl IngestError {
    /// Stable snake_case label for surfaces and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidBook(_) => "invalid_request",
            Self::Chunking(_) => "chunking_failure",
            Self::Embedding(_) => "embedding_failure",
            Self::Qdrant(_) => "index_failure",
        }
    }
}

/// Which part of a book a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Chapter text, worked examples, exercises.
    BookContent,
    /// Solutions, answer keys and hints.
    Solution,
}

impl ContentType {
    /// Payload value stored in Qdrant.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BookContent => "book_content",
            Self::Solution => "solution",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Book text split into its two sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookSections {
    /// Everything before the first solutions header.
    pub content: String,
    /// The solutions header onward, plus any companion solutions text.
    pub solutions: String,
}

/// Summary of one book ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    /// Chunks indexed with `content_type = book_content`.
    pub content_chunks: usize,
    /// Chunks indexed with `content_type = solution`.
    pub solution_chunks: usize,
    /// Chunks skipped because an identical chunk appeared earlier in the same section.
    pub skipped_duplicates: usize,
    /// Token budget used while chunking.
    pub chunk_size: usize,
}

impl IngestOutcome {
    /// Total chunks written for the book.
    pub fn total_chunks(&self) -> usize {
        self.content_chunks + self.solution_chunks
    }
}
