//! Long-lived application service shared by the HTTP and MCP surfaces.

use crate::config::{Config, get_config};
use crate::corpus::{CorpusIngestor, IngestError, IngestOutcome, IngestSettings};
use crate::embedding::{EmbeddingClient, EmbeddingClientError, build_embedding_client};
use crate::generation::{GenerativeClient, GenerativeClientError, build_generative_client};
use crate::metrics::{GenerationMetrics, MetricsSnapshot};
use crate::pipeline::{
    GenerationError, GenerationRequest, GenerationResult, Orchestrator, OrchestratorSettings,
    QdrantCorpusIndex, Retriever,
};
use crate::qdrant::{QdrantError, QdrantService};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while wiring the service at startup.
#[derive(Debug, Error)]
pub enum ServiceInitError {
    /// Embedding client could not be built.
    #[error("Failed to build embedding client: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Generative client could not be built.
    #[error("Failed to build generative client: {0}")]
    Generation(#[from] GenerativeClientError),
    /// Qdrant client could not be built or the collection could not be ensured.
    #[error("Failed to prepare Qdrant: {0}")]
    Qdrant(#[from] QdrantError),
    /// The corpus collection could not be created or indexed.
    #[error("Failed to prepare corpus collection: {0}")]
    Corpus(#[from] IngestError),
}

/// Reachability and readiness snapshot for the corpus store.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CorpusHealth {
    /// Whether Qdrant answered the probe.
    pub reachable: bool,
    /// Whether the corpus collection exists.
    pub collection_present: bool,
    /// Name of the corpus collection.
    pub collection: String,
    /// Diagnostic captured when Qdrant is unreachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Operations exposed to external surfaces (HTTP, MCP).
#[async_trait]
pub trait ExamForgeApi: Send + Sync {
    /// Run a generation request through the pipeline.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResult, GenerationError>;

    /// Ingest one book into the corpus.
    async fn ingest_book(
        &self,
        title: String,
        text: String,
        solutions: Option<String>,
    ) -> Result<IngestOutcome, IngestError>;

    /// Distinct books present in the corpus.
    async fn list_sources(&self) -> Result<BTreeSet<String>, IngestError>;

    /// Probe the corpus store.
    async fn corpus_health(&self) -> CorpusHealth;

    /// Current counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Owns the pipeline, the ingestor and the metrics registry.
///
/// Build once at process start and share through an `Arc`.
pub struct ExamForgeService {
    orchestrator: Orchestrator,
    ingestor: CorpusIngestor,
    qdrant: Arc<QdrantService>,
    metrics: Arc<GenerationMetrics>,
}

impl ExamForgeService {
    /// Build the service from the global configuration and ensure the corpus collection exists.
    pub async fn new() -> Result<Self, ServiceInitError> {
        let config = get_config();
        let service = Self::from_config(config)?;
        service.ingestor.ensure_collection().await?;
        Ok(service)
    }

    /// Wire clients for `config` without touching the network.
    pub fn from_config(config: &Config) -> Result<Self, ServiceInitError> {
        tracing::info!("Initializing embedding client");
        let embedder: Arc<dyn EmbeddingClient> = Arc::from(build_embedding_client(config)?);
        tracing::info!("Initializing generative client");
        let generator: Arc<dyn GenerativeClient> = Arc::from(build_generative_client(config)?);
        let qdrant = Arc::new(QdrantService::from_config(config)?);

        let index = Arc::new(QdrantCorpusIndex::new(
            qdrant.clone(),
            config.qdrant_collection_name.clone(),
        ));
        let retriever = Retriever::new(embedder.clone(), index, config.embedding_dimension);
        let orchestrator = Orchestrator::new(
            retriever,
            generator,
            OrchestratorSettings {
                top_k: config.retrieval_top_k,
                min_extraction_chars: config.extraction_min_chars,
            },
        );
        let ingestor = CorpusIngestor::new(
            embedder,
            qdrant.clone(),
            IngestSettings::from_config(config),
        );

        Ok(Self {
            orchestrator,
            ingestor,
            qdrant,
            metrics: Arc::new(GenerationMetrics::new()),
        })
    }

    /// Run a request, recording metrics for its outcome.
    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        self.metrics.record_request(request.kind());
        match self.orchestrator.run(request).await {
            Ok(result) => {
                self.metrics.record_success(result.len());
                Ok(result)
            }
            Err(error) => {
                self.metrics.record_failure(error.kind());
                Err(error)
            }
        }
    }

    /// Ingest a book and count it.
    pub async fn ingest_book(
        &self,
        title: &str,
        text: &str,
        solutions: Option<&str>,
    ) -> Result<IngestOutcome, IngestError> {
        let outcome = self.ingestor.ingest_book(title, text, solutions).await?;
        self.metrics.record_book(outcome.total_chunks() as u64);
        Ok(outcome)
    }

    /// Distinct `source_book` values in the corpus collection.
    pub async fn list_sources(&self) -> Result<BTreeSet<String>, IngestError> {
        Ok(self
            .qdrant
            .list_source_books(self.ingestor.collection())
            .await?)
    }

    /// Probe Qdrant for reachability and the corpus collection.
    pub async fn corpus_health(&self) -> CorpusHealth {
        let collection = self.ingestor.collection().to_string();
        match self.qdrant.list_collections().await {
            Ok(collections) => CorpusHealth {
                reachable: true,
                collection_present: collections.iter().any(|name| name == &collection),
                collection,
                error: None,
            },
            Err(error) => {
                tracing::warn!(error = %error, "Qdrant health probe failed");
                CorpusHealth {
                    reachable: false,
                    collection_present: false,
                    collection,
                    error: Some(error.to_string()),
                }
            }
        }
    }

    /// Current counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl ExamForgeApi for ExamForgeService {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        ExamForgeService::generate(self, request).await
    }

    async fn ingest_book(
        &self,
        title: String,
        text: String,
        solutions: Option<String>,
    ) -> Result<IngestOutcome, IngestError> {
        ExamForgeService::ingest_book(self, &title, &text, solutions.as_deref()).await
    }

    async fn list_sources(&self) -> Result<BTreeSet<String>, IngestError> {
        ExamForgeService::list_sources(self).await
    }

    async fn corpus_health(&self) -> CorpusHealth {
        ExamForgeService::corpus_health(self).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        ExamForgeService::metrics_snapshot(self)
    }
}
