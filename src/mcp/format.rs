//! Payload builders shared by MCP tools and resources.

use crate::{
    config::{Config, EmbeddingProvider, GenerationProvider},
    pipeline::{FillInTheBlankQuestion, MultipleChoiceQuestion, QuestionType, schema_clause},
    service::CorpusHealth,
};
use rmcp::model::ResourceContents;
use schemars::schema_for;
use serde::Serialize;
use serde_json::{Map, Value, json};

pub(crate) const APPLICATION_JSON: &str = "application/json";

/// Backend identity reported by the health resource.
#[derive(Debug, Clone)]
pub(crate) struct BackendSummary {
    pub(crate) embedding_provider: &'static str,
    pub(crate) embedding_model: String,
    pub(crate) embedding_dimension: usize,
    pub(crate) generation_provider: &'static str,
    pub(crate) generation_model: String,
    pub(crate) qdrant_url: String,
}

impl BackendSummary {
    pub(crate) fn from_config(config: &Config) -> Self {
        Self {
            embedding_provider: embedding_provider_label(config.embedding_provider),
            embedding_model: config.embedding_model.clone(),
            embedding_dimension: config.embedding_dimension,
            generation_provider: generation_provider_label(config.generation_provider),
            generation_model: config.generation_model.clone(),
            qdrant_url: config.qdrant_url.clone(),
        }
    }
}

fn embedding_provider_label(provider: EmbeddingProvider) -> &'static str {
    match provider {
        EmbeddingProvider::Ollama => "ollama",
        EmbeddingProvider::OpenAI => "openai",
        EmbeddingProvider::Hashing => "hashing",
    }
}

fn generation_provider_label(provider: GenerationProvider) -> &'static str {
    match provider {
        GenerationProvider::Gemini => "gemini",
        GenerationProvider::Ollama => "ollama",
    }
}

/// Describe every supported question type: its label, the JSON schema of one question, and the
/// clause the prompt uses to request that shape.
pub(crate) fn question_types_payload() -> String {
    let types: Vec<Value> = QuestionType::ALL
        .into_iter()
        .map(|question_type| {
            let schema = match question_type {
                QuestionType::MultipleChoice => {
                    serde_json::to_value(schema_for!(MultipleChoiceQuestion))
                }
                QuestionType::FillInTheBlank => {
                    serde_json::to_value(schema_for!(FillInTheBlankQuestion))
                }
            }
            .unwrap_or(Value::Null);
            json!({
                "questionType": question_type.as_str(),
                "schema": schema,
                "promptClause": schema_clause(question_type),
            })
        })
        .collect();
    let payload = json!({
        "questionTypes": types,
        "default": QuestionType::MultipleChoice.as_str(),
    });
    serialize_json(&payload, "mcp://question-types")
}

/// Build the health payload from the backend identity and a corpus probe.
pub(crate) fn health_payload(backends: &BackendSummary, health: &CorpusHealth) -> String {
    let mut qdrant = Map::new();
    qdrant.insert("url".into(), Value::String(backends.qdrant_url.clone()));
    qdrant.insert("reachable".into(), Value::Bool(health.reachable));
    qdrant.insert(
        "collection".into(),
        Value::String(health.collection.clone()),
    );
    qdrant.insert(
        "collectionPresent".into(),
        Value::Bool(health.collection_present),
    );
    if let Some(error) = health.error.as_ref() {
        qdrant.insert("error".into(), Value::String(error.clone()));
    }

    let payload = json!({
        "embedding": {
            "provider": backends.embedding_provider,
            "model": backends.embedding_model,
            "dimension": backends.embedding_dimension,
        },
        "generation": {
            "provider": backends.generation_provider,
            "model": backends.generation_model,
        },
        "qdrant": Value::Object(qdrant),
    });

    serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string())
}

/// Sources snapshot returned by the `sources` resource.
#[derive(Debug, Serialize)]
pub(crate) struct SourcesSnapshot {
    /// Distinct book titles, sorted.
    pub(crate) sources: Vec<String>,
}

/// Serialize a value to JSON, falling back to compact formatting on error.
pub(crate) fn serialize_json<T: Serialize>(value: &T, context_uri: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|error| {
        tracing::warn!(uri = context_uri, %error, "Failed to serialize JSON prettily");
        serde_json::to_string(value).unwrap_or_else(|_| "{}".into())
    })
}

/// Wrap JSON text as MCP resource contents.
pub(crate) fn json_resource_contents(uri: &str, text: String) -> ResourceContents {
    ResourceContents::TextResourceContents {
        uri: uri.to_string(),
        mime_type: Some(APPLICATION_JSON.into()),
        text,
        meta: None,
    }
}
