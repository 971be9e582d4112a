//! Failure taxonomy for the generation pipeline.

use super::orchestrator::GenerationStage;
use super::validator::MalformedOutput;
use crate::embedding::EmbeddingClientError;
use crate::generation::GenerativeClientError;
use crate::qdrant::QdrantError;
use thiserror::Error;

/// Typed outcome of a failed pipeline run. Nothing here is retried or fatal to the process.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The request violates its own shape constraints.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// The embedder was unreachable or returned an unusable vector.
    #[error("Failed to embed topic: {0}")]
    EmbeddingFailure(#[from] EmbeddingClientError),
    /// The corpus index was unreachable or returned an error.
    #[error("Corpus index query failed: {0}")]
    IndexFailure(#[from] QdrantError),
    /// Retrieval succeeded but found nothing to ground the questions in.
    #[error("No corpus context found for topic '{topic}'")]
    NoContext {
        /// Topic that produced zero matches.
        topic: String,
    },
    /// The generative call failed.
    #[error("Generative backend failed: {0}")]
    GenerationBackendFailure(#[from] GenerativeClientError),
    /// The model answered with something that is not a valid question array.
    #[error("Model output rejected: {0}")]
    MalformedOutput(#[from] MalformedOutput),
    /// The image transcription was too short to be worth formatting.
    #[error("Transcription too short: {characters} characters, need at least {minimum}")]
    InsufficientExtraction {
        /// Characters in the trimmed transcription.
        characters: usize,
        /// Configured minimum.
        minimum: usize,
    },
}

impl GenerationError {
    /// Stable snake_case label used by logs, metrics and both surfaces.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::EmbeddingFailure(_) => "embedding_failure",
            Self::IndexFailure(_) => "index_failure",
            Self::NoContext { .. } => "no_context",
            Self::GenerationBackendFailure(_) => "generation_backend_failure",
            Self::MalformedOutput(_) => "malformed_output",
            Self::InsufficientExtraction { .. } => "insufficient_extraction",
        }
    }

    /// Pipeline stage that was active when the failure occurred.
    pub fn stage(&self) -> GenerationStage {
        match self {
            Self::InvalidRequest(_) => GenerationStage::Idle,
            Self::EmbeddingFailure(_) | Self::IndexFailure(_) | Self::NoContext { .. } => {
                GenerationStage::Retrieving
            }
            Self::GenerationBackendFailure(_) | Self::InsufficientExtraction { .. } => {
                GenerationStage::Generating
            }
            Self::MalformedOutput(_) => GenerationStage::Validating,
        }
    }

    /// Whether the failure was caused by the request rather than a backend.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_) | Self::NoContext { .. } | Self::InsufficientExtraction { .. }
        )
    }
}
