//! HTTP surface for ExamForge.
//!
//! - `POST /questions/generate` – Generate questions about a topic from corpus context.
//!   Body: `{ "topic", "num_questions", "question_type", "difficulty" }`.
//! - `POST /questions/extract` – Extract multiple-choice questions from a photographed paper.
//!   Multipart form with one file field named `image`; its content type is the image MIME type.
//! - `POST /corpus/books` – Ingest a textbook: `{ "title", "text", "solutions"? }`.
//! - `GET /corpus/sources` – Distinct books present in the corpus.
//! - `GET /health` – Qdrant reachability and corpus collection presence.
//! - `GET /metrics` – Request, failure and ingestion counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! Pipeline failures are returned as `{ "error": kind, "message": text }`. Caller problems map
//! to 400/422 and backend problems to 502.

use crate::corpus::IngestError;
use crate::pipeline::{
    GenerationError, GenerationRequest, ImageRequest, QuestionSet, QuestionType, TopicRequest,
};
use crate::service::ExamForgeApi;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;

/// Largest accepted request body (question-paper photos can be large).
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;
const IMAGE_FIELD: &str = "image";
const DEFAULT_DIFFICULTY: &str = "medium";

/// Build the HTTP router exposing the generation and corpus API.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: ExamForgeApi + 'static,
{
    Router::new()
        .route("/questions/generate", post(generate_questions::<S>))
        .route("/questions/extract", post(extract_questions::<S>))
        .route("/corpus/books", post(ingest_book::<S>))
        .route("/corpus/sources", get(list_sources::<S>))
        .route("/health", get(get_health::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(service)
}

/// Request body for `POST /questions/generate`.
#[derive(Deserialize)]
struct GenerateRequest {
    topic: String,
    num_questions: u32,
    question_type: String,
    #[serde(default)]
    difficulty: Option<String>,
}

impl GenerateRequest {
    fn into_topic_request(self) -> Result<TopicRequest, AppError> {
        let num_questions = NonZeroU32::new(self.num_questions)
            .ok_or_else(|| AppError::BadRequest("num_questions must be at least 1".into()))?;
        let question_type: QuestionType =
            self.question_type.parse().map_err(AppError::BadRequest)?;
        let difficulty = self
            .difficulty
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DIFFICULTY.to_string());
        Ok(TopicRequest {
            topic: self.topic,
            num_questions,
            question_type,
            difficulty,
        })
    }
}

/// Generate questions grounded in the corpus.
async fn generate_questions<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<QuestionSet>, AppError>
where
    S: ExamForgeApi,
{
    let request = request.into_topic_request()?;
    tracing::info!(
        topic = %request.topic,
        num_questions = request.num_questions.get(),
        question_type = %request.question_type,
        difficulty = %request.difficulty,
        "Generate request received"
    );
    let result = service.generate(GenerationRequest::Topic(request)).await?;
    Ok(Json(result))
}

/// Extract questions from the uploaded `image` field.
async fn extract_questions<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Json<QuestionSet>, AppError>
where
    S: ExamForgeApi,
{
    let mut image = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let mime_type = field
            .content_type()
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("image field has no content type".into()))?;
        let image_bytes = field.bytes().await?.to_vec();
        image = Some(ImageRequest {
            image_bytes,
            mime_type,
        });
        break;
    }
    let image = image
        .ok_or_else(|| AppError::BadRequest(format!("multipart field '{IMAGE_FIELD}' is required")))?;
    tracing::info!(
        mime_type = %image.mime_type,
        bytes = image.image_bytes.len(),
        "Extract request received"
    );

    let result = service.generate(GenerationRequest::Image(image)).await?;
    Ok(Json(result))
}

/// Request body for `POST /corpus/books`.
#[derive(Deserialize)]
struct IngestBookRequest {
    title: String,
    text: String,
    #[serde(default)]
    solutions: Option<String>,
}

/// Success response for `POST /corpus/books`.
#[derive(Serialize)]
struct IngestBookResponse {
    title: String,
    content_chunks: usize,
    solution_chunks: usize,
    skipped_duplicates: usize,
    chunk_size: usize,
}

/// Ingest a textbook into the corpus.
async fn ingest_book<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<IngestBookRequest>,
) -> Result<Json<IngestBookResponse>, AppError>
where
    S: ExamForgeApi,
{
    let IngestBookRequest {
        title,
        text,
        solutions,
    } = request;
    let outcome = service
        .ingest_book(title.clone(), text, solutions)
        .await?;
    tracing::info!(
        book = %title,
        content_chunks = outcome.content_chunks,
        solution_chunks = outcome.solution_chunks,
        "Ingest request completed"
    );
    Ok(Json(IngestBookResponse {
        title,
        content_chunks: outcome.content_chunks,
        solution_chunks: outcome.solution_chunks,
        skipped_duplicates: outcome.skipped_duplicates,
        chunk_size: outcome.chunk_size,
    }))
}

/// Response body for `GET /corpus/sources`.
#[derive(Serialize)]
struct SourcesResponse {
    sources: Vec<String>,
}

async fn list_sources<S>(State(service): State<Arc<S>>) -> Result<Json<SourcesResponse>, AppError>
where
    S: ExamForgeApi,
{
    let sources = service.list_sources().await?.into_iter().collect();
    Ok(Json(SourcesResponse { sources }))
}

/// Corpus health; 503 when Qdrant is unreachable.
async fn get_health<S>(State(service): State<Arc<S>>) -> Response
where
    S: ExamForgeApi,
{
    let health = service.corpus_health().await;
    let status = if health.reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health)).into_response()
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Response
where
    S: ExamForgeApi,
{
    Json(service.metrics_snapshot()).into_response()
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "generate_questions",
                method: "POST",
                path: "/questions/generate",
                description: "Generate multiple-choice or fill-in-the-blank questions about a topic, grounded in retrieved textbook context.",
                request_example: Some(json!({
                    "topic": "projectile motion",
                    "num_questions": 3,
                    "question_type": "multiple-choice",
                    "difficulty": "medium"
                })),
            },
            CommandDescriptor {
                name: "extract_questions",
                method: "POST",
                path: "/questions/extract",
                description: "Upload a question-paper photo as multipart field 'image'; returns the transcribed questions as multiple-choice items.",
                request_example: None,
            },
            CommandDescriptor {
                name: "ingest_book",
                method: "POST",
                path: "/corpus/books",
                description: "Split a textbook into content and solutions, chunk, embed and index it.",
                request_example: Some(json!({
                    "title": "HC Verma Vol 1",
                    "text": "Chapter 1 ...\nSolutions\n1. ...",
                    "solutions": "optional companion solutions text"
                })),
            },
            CommandDescriptor {
                name: "list_sources",
                method: "GET",
                path: "/corpus/sources",
                description: "Return the distinct books present in the corpus.",
                request_example: None,
            },
            CommandDescriptor {
                name: "health",
                method: "GET",
                path: "/health",
                description: "Report Qdrant reachability and whether the corpus collection exists.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return request, failure and ingestion counters.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    BadRequest(String),
    Generation(GenerationError),
    Ingest(IngestError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Generation(GenerationError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            Self::Generation(
                GenerationError::NoContext { .. } | GenerationError::InsufficientExtraction { .. },
            ) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Generation(_) => StatusCode::BAD_GATEWAY,
            Self::Ingest(IngestError::InvalidBook(_)) => StatusCode::BAD_REQUEST,
            Self::Ingest(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "invalid_request",
            Self::Generation(error) => error.kind(),
            Self::Ingest(error) => error.kind(),
        }
    }

    fn message(&self) -> String {
        match self {
            Self::BadRequest(message) => message.clone(),
            Self::Generation(error) => error.to_string(),
            Self::Ingest(error) => error.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(kind = self.kind(), error = %self.message(), "Request failed");
        }
        let body = json!({ "error": self.kind(), "message": self.message() });
        (status, Json(body)).into_response()
    }
}

impl From<GenerationError> for AppError {
    fn from(inner: GenerationError) -> Self {
        Self::Generation(inner)
    }
}

impl From<IngestError> for AppError {
    fn from(inner: IngestError) -> Self {
        Self::Ingest(inner)
    }
}

impl From<MultipartError> for AppError {
    fn from(inner: MultipartError) -> Self {
        Self::BadRequest(format!("invalid multipart body: {inner}"))
    }
}
