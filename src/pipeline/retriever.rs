//! Topic retrieval: embed the topic, query the corpus, rank the hits.

use super::error::GenerationError;
use super::types::ContextChunk;
use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::qdrant::{QdrantError, QdrantService, ScoredPoint};
use async_trait::async_trait;
use std::sync::Arc;

/// Nearest-neighbour lookup over the indexed corpus.
#[async_trait]
pub trait CorpusIndex: Send + Sync {
    /// Return up to `top_k` scored points with payloads, most similar first.
    async fn query(&self, vector: Vec<f32>, top_k: usize) -> Result<Vec<ScoredPoint>, QdrantError>;
}

/// [`CorpusIndex`] backed by one Qdrant collection.
pub struct QdrantCorpusIndex {
    service: Arc<QdrantService>,
    collection: String,
}

impl QdrantCorpusIndex {
    /// Query `collection` through the shared Qdrant client.
    pub fn new(service: Arc<QdrantService>, collection: impl Into<String>) -> Self {
        Self {
            service,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl CorpusIndex for QdrantCorpusIndex {
    async fn query(&self, vector: Vec<f32>, top_k: usize) -> Result<Vec<ScoredPoint>, QdrantError> {
        self.service
            .search_points(&self.collection, vector, top_k)
            .await
    }
}

/// Embeds topics and turns index hits into ranked context.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingClient>,
    index: Arc<dyn CorpusIndex>,
    dimension: usize,
}

impl Retriever {
    /// Build a retriever that expects vectors of `dimension` from the embedder.
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        index: Arc<dyn CorpusIndex>,
        dimension: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            dimension,
        }
    }

    /// Retrieve up to `top_k` chunks for `topic`, ranked by descending similarity.
    ///
    /// Zero matches is an empty result, not an error.
    pub async fn retrieve(
        &self,
        topic: &str,
        top_k: usize,
    ) -> Result<Vec<ContextChunk>, GenerationError> {
        let vector = self.embed_topic(topic).await?;
        let points = self.index.query(vector, top_k).await.map_err(|error| {
            tracing::warn!(error = %error, "Corpus index query failed");
            GenerationError::IndexFailure(error)
        })?;
        let chunks = rank_points(points);
        tracing::debug!(topic, top_k, retrieved = chunks.len(), "Retrieved context");
        Ok(chunks)
    }

    async fn embed_topic(&self, topic: &str) -> Result<Vec<f32>, GenerationError> {
        let mut vectors = self
            .embedder
            .generate_embeddings(vec![topic.to_string()])
            .await?;
        let vector = vectors
            .pop()
            .filter(|vector| !vector.is_empty())
            .ok_or_else(|| {
                EmbeddingClientError::InvalidResponse("embedder returned no vector".into())
            })?;
        if vector.len() != self.dimension {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                vector.len()
            ))
            .into());
        }
        Ok(vector)
    }
}

/// Drop text-less hits, order by score (stable on ties) and assign 1-based ranks.
fn rank_points(points: Vec<ScoredPoint>) -> Vec<ContextChunk> {
    let mut hits: Vec<(f32, String, Option<String>)> = points
        .into_iter()
        .filter_map(|point| {
            let payload = point.payload?;
            let text = payload
                .get("text")
                .and_then(|value| value.as_str())
                .filter(|text| !text.trim().is_empty())?
                .to_string();
            let source = payload
                .get("source_book")
                .and_then(|value| value.as_str())
                .map(str::to_string);
            Some((point.score, text, source))
        })
        .collect();
    hits.sort_by(|a, b| b.0.total_cmp(&a.0));

    hits.into_iter()
        .enumerate()
        .map(|(position, (score, text, source))| ContextChunk {
            text,
            relevance_rank: position + 1,
            score,
            source,
        })
        .collect()
}
