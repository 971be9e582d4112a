//! Textbook ingestion: section split, chunking, embedding, and Qdrant writes.

use super::chunking::{chunk_text, determine_chunk_size};
use super::sections::{append_companion_solutions, split_sections};
use super::types::{ContentType, IngestError, IngestOutcome};
use crate::config::{Config, EmbeddingProvider};
use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::qdrant::{ChunkMetadata, ChunkPoint, QdrantService, chunk_point_id, compute_chunk_hash};
use std::collections::HashSet;
use std::sync::Arc;

const EMBEDDING_BATCH_SIZE: usize = 64;

/// Chunking and storage settings for ingestion.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Target collection.
    pub collection: String,
    /// Vector size used when the collection has to be created.
    pub dimension: usize,
    /// Embedding provider, used to pick a tokenizer.
    pub provider: EmbeddingProvider,
    /// Embedding model, used to pick a tokenizer and context window.
    pub model: String,
    /// Explicit chunk size in tokens, if configured.
    pub chunk_size: Option<usize>,
    /// Token overlap between adjacent chunks.
    pub chunk_overlap: usize,
}

impl IngestSettings {
    /// Derive settings from the runtime configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            collection: config.qdrant_collection_name.clone(),
            dimension: config.embedding_dimension,
            provider: config.embedding_provider,
            model: config.embedding_model.clone(),
            chunk_size: config.text_splitter_chunk_size,
            chunk_overlap: config.text_splitter_chunk_overlap.unwrap_or(0),
        }
    }
}

#[derive(Debug)]
struct PreparedChunk {
    text: String,
    chunk_hash: String,
}

/// Keep the first occurrence of each chunk, returning the number of duplicates dropped.
fn dedupe_chunks(chunks: Vec<String>) -> (Vec<PreparedChunk>, usize) {
    let mut seen = HashSet::new();
    let mut prepared = Vec::with_capacity(chunks.len());
    let mut skipped = 0;

    for text in chunks {
        if text.trim().is_empty() {
            continue;
        }
        let chunk_hash = compute_chunk_hash(&text);
        if seen.insert(chunk_hash.clone()) {
            prepared.push(PreparedChunk { text, chunk_hash });
        } else {
            skipped += 1;
        }
    }

    (prepared, skipped)
}

/// Writes textbooks into the corpus collection.
pub struct CorpusIngestor {
    embedder: Arc<dyn EmbeddingClient>,
    qdrant: Arc<QdrantService>,
    settings: IngestSettings,
}

impl CorpusIngestor {
    /// Build an ingestor over shared embedding and Qdrant clients.
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        qdrant: Arc<QdrantService>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            embedder,
            qdrant,
            settings,
        }
    }

    /// Target collection name.
    pub fn collection(&self) -> &str {
        &self.settings.collection
    }

    /// Create the corpus collection and its payload indexes when missing.
    pub async fn ensure_collection(&self) -> Result<(), IngestError> {
        let collection = &self.settings.collection;
        self.qdrant
            .create_collection_if_not_exists(collection, self.settings.dimension as u64)
            .await?;
        self.qdrant.ensure_payload_indexes(collection).await?;
        tracing::debug!(collection = %collection, "Corpus collection ready");
        Ok(())
    }

    /// Ingest one book, with optional companion solutions text.
    ///
    /// Re-ingesting the same title replaces every point stored for it earlier.
    pub async fn ingest_book(
        &self,
        title: &str,
        text: &str,
        companion_solutions: Option<&str>,
    ) -> Result<IngestOutcome, IngestError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(IngestError::InvalidBook("title must not be blank".into()));
        }
        if text.trim().is_empty() && companion_solutions.is_none_or(|extra| extra.trim().is_empty())
        {
            return Err(IngestError::InvalidBook(format!("'{title}' has no text")));
        }

        tracing::info!(book = title, collection = %self.settings.collection, "Ingesting book");
        self.ensure_collection().await?;

        let mut sections = split_sections(text);
        if let Some(extra) = companion_solutions {
            append_companion_solutions(&mut sections, extra);
        }

        let chunk_size = determine_chunk_size(
            self.settings.chunk_size,
            self.settings.provider,
            &self.settings.model,
        );
        tracing::debug!(
            book = title,
            chunk_size,
            overlap = self.settings.chunk_overlap,
            content_chars = sections.content.len(),
            solution_chars = sections.solutions.len(),
            "Split book sections"
        );

        let mut outcome = IngestOutcome {
            chunk_size,
            ..IngestOutcome::default()
        };
        for (content_type, section) in [
            (ContentType::BookContent, sections.content.as_str()),
            (ContentType::Solution, sections.solutions.as_str()),
        ] {
            let (written, skipped) = self
                .ingest_section(title, content_type, section, chunk_size)
                .await?;
            outcome.skipped_duplicates += skipped;
            match content_type {
                ContentType::BookContent => outcome.content_chunks = written,
                ContentType::Solution => outcome.solution_chunks = written,
            }
        }

        tracing::info!(
            book = title,
            content_chunks = outcome.content_chunks,
            solution_chunks = outcome.solution_chunks,
            skipped_duplicates = outcome.skipped_duplicates,
            chunk_size,
            "Book indexed"
        );
        Ok(outcome)
    }

    async fn ingest_section(
        &self,
        title: &str,
        content_type: ContentType,
        section: &str,
        chunk_size: usize,
    ) -> Result<(usize, usize), IngestError> {
        let chunks = chunk_text(
            section,
            chunk_size,
            self.settings.chunk_overlap,
            self.settings.provider,
            &self.settings.model,
        )?;
        let (prepared, skipped) = dedupe_chunks(chunks);
        let metadata = ChunkMetadata {
            source_book: title.to_string(),
            content_type: content_type.as_str().to_string(),
        };
        if prepared.is_empty() {
            self.qdrant
                .delete_section(&self.settings.collection, &metadata)
                .await?;
            tracing::info!(book = title, %content_type, "No text found for section; skipping");
            return Ok((0, skipped));
        }

        let texts: Vec<String> = prepared.iter().map(|chunk| chunk.text.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBEDDING_BATCH_SIZE) {
            vectors.extend(self.embedder.generate_embeddings(batch.to_vec()).await?);
        }
        if vectors.len() != prepared.len() {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "expected {} embeddings, received {}",
                prepared.len(),
                vectors.len()
            ))
            .into());
        }

        let points: Vec<ChunkPoint> = prepared
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(index, (chunk, vector))| ChunkPoint {
                id: chunk_point_id(title, content_type.as_str(), index),
                text: chunk.text,
                chunk_hash: chunk.chunk_hash,
                vector,
            })
            .collect();

        self.qdrant
            .delete_section(&self.settings.collection, &metadata)
            .await?;
        let written = self
            .qdrant
            .index_points(&self.settings.collection, points, &metadata)
            .await?;
        tracing::debug!(book = title, %content_type, written, skipped, "Section indexed");
        Ok((written, skipped))
    }
}
