//! Generation state machine shared by the topic and image paths.
//!
//! ```text
//! Idle -> Retrieving -> PromptBuilt -> Generating -> Validating -> Done
//!   \          \                          \              \
//!    `----------`--------------------------`--------------`--> Failed
//! ```
//!
//! The image path skips `Retrieving`/`PromptBuilt` and passes through `Generating` twice
//! (transcription, then formatting). Nothing is retried.

use super::error::GenerationError;
use super::prompt::{build_formatting_prompt, build_generation_prompt, build_transcription_prompt};
use super::retriever::Retriever;
use super::types::{GenerationRequest, GenerationResult, ImageRequest, QuestionType, TopicRequest};
use super::validator::parse_questions;
use crate::config::{DEFAULT_EXTRACTION_MIN_CHARS, DEFAULT_RETRIEVAL_TOP_K};
use crate::generation::{GenerativeClient, ImagePart};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// States a request moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationStage {
    /// Request accepted, nothing done yet.
    Idle,
    /// Embedding the topic and querying the corpus.
    Retrieving,
    /// Prompt rendered from the retrieved context.
    PromptBuilt,
    /// Waiting on the generative backend.
    Generating,
    /// Parsing and checking the model output.
    Validating,
    /// Terminal success.
    Done,
    /// Terminal failure.
    Failed,
}

impl fmt::Display for GenerationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Retrieving => "retrieving",
            Self::PromptBuilt => "prompt_built",
            Self::Generating => "generating",
            Self::Validating => "validating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Tunables applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Number of context chunks requested from the index.
    pub top_k: usize,
    /// Minimum trimmed transcription length, in characters, on the image path.
    pub min_extraction_chars: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_RETRIEVAL_TOP_K,
            min_extraction_chars: DEFAULT_EXTRACTION_MIN_CHARS,
        }
    }
}

/// Per-request stage bookkeeping; every transition is logged at debug level.
struct StageTracker {
    request_id: Uuid,
    stage: GenerationStage,
}

impl StageTracker {
    fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            stage: GenerationStage::Idle,
        }
    }

    fn advance(&mut self, next: GenerationStage) {
        tracing::debug!(
            request_id = %self.request_id,
            from = %self.stage,
            to = %next,
            "Generation stage transition"
        );
        self.stage = next;
    }

    fn fail(&mut self, error: GenerationError) -> GenerationError {
        tracing::debug!(
            request_id = %self.request_id,
            from = %self.stage,
            to = %GenerationStage::Failed,
            error_kind = error.kind(),
            "Generation stage transition"
        );
        self.stage = GenerationStage::Failed;
        error
    }
}

/// Runs generation requests end to end.
pub struct Orchestrator {
    retriever: Retriever,
    generator: Arc<dyn GenerativeClient>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    /// Assemble an orchestrator from its collaborators.
    pub fn new(
        retriever: Retriever,
        generator: Arc<dyn GenerativeClient>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            retriever,
            generator,
            settings,
        }
    }

    /// Process one request, returning validated questions or a typed failure.
    pub async fn run(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        let request_id = Uuid::new_v4();
        let mut tracker = StageTracker::new(request_id);
        tracing::info!(%request_id, kind = request.kind(), "Generation request received");

        let outcome = match &request {
            GenerationRequest::Topic(topic) => self.run_topic(topic, &mut tracker).await,
            GenerationRequest::Image(image) => self.run_image(image, &mut tracker).await,
        };

        match outcome {
            Ok(result) => {
                tracker.advance(GenerationStage::Done);
                tracing::info!(
                    %request_id,
                    question_type = %result.question_type(),
                    questions = result.len(),
                    "Generation request completed"
                );
                Ok(result)
            }
            Err(error) => {
                let error = tracker.fail(error);
                tracing::warn!(
                    %request_id,
                    error_kind = error.kind(),
                    stage = %error.stage(),
                    error = %error,
                    "Generation request failed"
                );
                Err(error)
            }
        }
    }

    async fn run_topic(
        &self,
        request: &TopicRequest,
        tracker: &mut StageTracker,
    ) -> Result<GenerationResult, GenerationError> {
        let topic = request.topic.trim();
        if topic.is_empty() {
            return Err(GenerationError::InvalidRequest(
                "topic must not be blank".into(),
            ));
        }

        tracker.advance(GenerationStage::Retrieving);
        let context = self.retriever.retrieve(topic, self.settings.top_k).await?;
        if context.is_empty() {
            return Err(GenerationError::NoContext {
                topic: topic.to_string(),
            });
        }

        let prompt = build_generation_prompt(
            topic,
            &context,
            request.num_questions.get(),
            request.question_type,
            request.difficulty.trim(),
        );
        tracker.advance(GenerationStage::PromptBuilt);

        tracker.advance(GenerationStage::Generating);
        let raw = self.generator.generate(&prompt, None).await?;
        log_model_output(tracker.request_id, "generation", &raw);

        tracker.advance(GenerationStage::Validating);
        let questions = parse_questions(&raw, request.question_type)?;
        if questions.len() != request.num_questions.get() as usize {
            tracing::info!(
                request_id = %tracker.request_id,
                requested = request.num_questions.get(),
                returned = questions.len(),
                "Model returned a different number of questions than requested"
            );
        }
        Ok(questions)
    }

    async fn run_image(
        &self,
        request: &ImageRequest,
        tracker: &mut StageTracker,
    ) -> Result<GenerationResult, GenerationError> {
        if request.image_bytes.is_empty() {
            return Err(GenerationError::InvalidRequest(
                "image must not be empty".into(),
            ));
        }
        let mime_type = request.mime_type.trim();
        if mime_type.is_empty() {
            return Err(GenerationError::InvalidRequest(
                "image MIME type must not be blank".into(),
            ));
        }

        tracker.advance(GenerationStage::Generating);
        let image = ImagePart {
            bytes: &request.image_bytes,
            mime_type,
        };
        let transcription = self
            .generator
            .generate(&build_transcription_prompt(), Some(image))
            .await?;
        log_model_output(tracker.request_id, "transcription", &transcription);

        let characters = transcription.trim().chars().count();
        if characters < self.settings.min_extraction_chars {
            return Err(GenerationError::InsufficientExtraction {
                characters,
                minimum: self.settings.min_extraction_chars,
            });
        }

        tracker.advance(GenerationStage::Generating);
        let formatted = self
            .generator
            .generate(&build_formatting_prompt(transcription.trim()), None)
            .await?;
        log_model_output(tracker.request_id, "formatting", &formatted);

        tracker.advance(GenerationStage::Validating);
        Ok(parse_questions(&formatted, QuestionType::MultipleChoice)?)
    }
}

fn log_model_output(request_id: Uuid, call: &'static str, raw: &str) {
    tracing::info!(%request_id, call, chars = raw.len(), "Model responded");
    tracing::debug!(%request_id, call, raw, "Raw model output");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingClient, HashingEmbeddingClient};
    use crate::generation::{GeminiClient, GenerativeClientError};
    use crate::pipeline::retriever::CorpusIndex;
    use crate::pipeline::types::QuestionSet;
    use crate::qdrant::{QdrantError, ScoredPoint};
    use async_trait::async_trait;
    use serde_json::{Map, Value, json};
    use std::collections::VecDeque;
    use std::num::NonZeroU32;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DIMENSION: usize = 16;

    struct StubIndex {
        texts: Vec<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CorpusIndex for StubIndex {
        async fn query(
            &self,
            _vector: Vec<f32>,
            top_k: usize,
        ) -> Result<Vec<ScoredPoint>, QdrantError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .texts
                .iter()
                .take(top_k)
                .enumerate()
                .map(|(position, text)| {
                    let mut payload = Map::new();
                    payload.insert("text".into(), Value::String((*text).to_string()));
                    ScoredPoint {
                        id: position.to_string(),
                        score: 1.0 - position as f32 * 0.1,
                        payload: Some(payload),
                    }
                })
                .collect())
        }
    }

    #[derive(Debug)]
    struct RecordedCall {
        prompt: String,
        image_mime: Option<String>,
    }

    struct ScriptedGenerator {
        replies: Mutex<VecDeque<Result<String, GenerativeClientError>>>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<Result<String, GenerativeClientError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().expect("lock").len()
        }
    }

    #[async_trait]
    impl GenerativeClient for ScriptedGenerator {
        async fn generate(
            &self,
            prompt: &str,
            image: Option<ImagePart<'_>>,
        ) -> Result<String, GenerativeClientError> {
            self.calls.lock().expect("lock").push(RecordedCall {
                prompt: prompt.to_string(),
                image_mime: image.map(|image| image.mime_type.to_string()),
            });
            self.replies
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Err(GenerativeClientError::GenerationFailed("unscripted".into())))
        }
    }

    fn orchestrator(index: Arc<StubIndex>, generator: Arc<ScriptedGenerator>) -> Orchestrator {
        let embedder: Arc<dyn EmbeddingClient> = Arc::new(HashingEmbeddingClient::new(DIMENSION));
        Orchestrator::new(
            Retriever::new(embedder, index, DIMENSION),
            generator,
            OrchestratorSettings::default(),
        )
    }

    fn index_with(texts: Vec<&'static str>) -> Arc<StubIndex> {
        Arc::new(StubIndex {
            texts,
            calls: AtomicUsize::new(0),
        })
    }

    fn mcq_json(count: usize) -> String {
        let items: Vec<Value> = (0..count)
            .map(|i| {
                json!({
                    "text": format!("Question {i} about projectile motion"),
                    "options": [
                        { "text": "A", "solution": "" },
                        { "text": "B", "solution": "" },
                        { "text": "C", "solution": "" },
                        { "text": "D", "solution": "" }
                    ],
                    "correctAnswer": i % 4
                })
            })
            .collect();
        Value::Array(items).to_string()
    }

    fn topic_request(topic: &str, count: u32, question_type: QuestionType) -> GenerationRequest {
        GenerationRequest::Topic(TopicRequest {
            topic: topic.into(),
            num_questions: NonZeroU32::new(count).expect("non-zero"),
            question_type,
            difficulty: "medium".into(),
        })
    }

    #[tokio::test]
    async fn topic_request_with_context_returns_parsed_questions() {
        let index = index_with(vec![
            "Projectile range depends on launch angle.",
            "Horizontal velocity is constant without drag.",
            "Time of flight is 2u sinθ / g.",
            "Maximum height is u² sin²θ / 2g.",
            "Trajectory is a parabola.",
        ]);
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(format!(
            "```json\n{}\n```",
            mcq_json(3)
        ))]));
        let result = orchestrator(index.clone(), generator.clone())
            .run(topic_request("projectile motion", 3, QuestionType::MultipleChoice))
            .await
            .expect("generation succeeds");

        assert_eq!(result.len(), 3);
        let QuestionSet::MultipleChoice(questions) = result else {
            panic!("expected multiple-choice questions");
        };
        assert!(questions.iter().all(|q| q.correct_answer < 4));

        assert_eq!(index.calls.load(Ordering::SeqCst), 1);
        let calls = generator.calls.lock().expect("lock");
        assert_eq!(calls.len(), 1);
        assert!(calls[0].image_mime.is_none());
        assert!(calls[0].prompt.contains("Trajectory is a parabola."));
        assert!(calls[0].prompt.contains("exactly 3 multiple-choice questions"));
    }

    #[tokio::test]
    async fn zero_chunks_fails_without_calling_generator() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(mcq_json(1))]));
        let error = orchestrator(index_with(Vec::new()), generator.clone())
            .run(topic_request("string theory", 2, QuestionType::MultipleChoice))
            .await
            .unwrap_err();

        assert!(matches!(error, GenerationError::NoContext { ref topic } if topic == "string theory"));
        assert_eq!(error.stage(), GenerationStage::Retrieving);
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn blank_topic_is_rejected_before_retrieval() {
        let index = index_with(vec!["unused"]);
        let generator = Arc::new(ScriptedGenerator::new(Vec::new()));
        let error = orchestrator(index.clone(), generator.clone())
            .run(topic_request("   ", 1, QuestionType::FillInTheBlank))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), "invalid_request");
        assert_eq!(index.calls.load(Ordering::SeqCst), 0);
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn malformed_output_is_never_returned() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(
            "Here are your questions: 1) ...".into(),
        )]));
        let error = orchestrator(index_with(vec!["Ohm's law: V = IR."]), generator)
            .run(topic_request("current electricity", 1, QuestionType::MultipleChoice))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), "malformed_output");
        assert_eq!(error.stage(), GenerationStage::Validating);
    }

    #[tokio::test]
    async fn fill_in_the_blank_validates_against_requested_type() {
        let reply = json!([
            { "text": "The unit of resistance is the ____.", "answerKey": "ohm" },
            { "text": "V = I____", "answerKey": "R" }
        ])
        .to_string();
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok(reply)]));
        let result = orchestrator(index_with(vec!["Ohm's law: V = IR."]), generator.clone())
            .run(topic_request("current electricity", 2, QuestionType::FillInTheBlank))
            .await
            .expect("valid questions");

        assert_eq!(result.question_type(), QuestionType::FillInTheBlank);
        assert_eq!(result.len(), 2);
        let calls = generator.calls.lock().expect("lock");
        assert!(calls[0].prompt.contains("\"answerKey\""));
    }

    #[tokio::test]
    async fn backend_failure_is_not_retried() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Err(
            GenerativeClientError::GenerationFailed("quota exceeded".into()),
        )]));
        let error = orchestrator(index_with(vec!["Work is force times distance."]), generator.clone())
            .run(topic_request("work", 1, QuestionType::MultipleChoice))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), "generation_backend_failure");
        assert_eq!(generator.call_count(), 1);
    }

    fn image_request() -> GenerationRequest {
        GenerationRequest::Image(ImageRequest {
            image_bytes: vec![0x89, b'P', b'N', b'G'],
            mime_type: "image/png".into(),
        })
    }

    #[tokio::test]
    async fn short_transcription_skips_formatting_call() {
        let index = index_with(vec!["unused"]);
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("  0123456789  ".into()),
            Ok(mcq_json(1)),
        ]));
        let error = orchestrator(index.clone(), generator.clone())
            .run(image_request())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            GenerationError::InsufficientExtraction { characters: 10, minimum: 20 }
        ));
        assert_eq!(generator.call_count(), 1);
        assert_eq!(index.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn image_path_transcribes_then_formats() {
        let transcription = "1. The SI unit of power is\n(a) watt (b) joule (c) newton (d) pascal";
        let mut inferred: Value = serde_json::from_str(&mcq_json(1)).expect("json");
        inferred[0]["answerInferred"] = json!(true);
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok(transcription.into()),
            Ok(inferred.to_string()),
        ]));
        let result = orchestrator(index_with(Vec::new()), generator.clone())
            .run(image_request())
            .await
            .expect("extraction succeeds");

        let QuestionSet::MultipleChoice(questions) = result else {
            panic!("image path always yields multiple-choice");
        };
        assert_eq!(questions.len(), 1);
        assert!(questions[0].answer_inferred);

        let calls = generator.calls.lock().expect("lock");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].image_mime.as_deref(), Some("image/png"));
        assert!(calls[1].image_mime.is_none());
        assert!(calls[1].prompt.contains(transcription));
    }

    #[tokio::test]
    async fn transcription_length_counts_characters_not_bytes() {
        // 19 two-byte characters: 38 bytes, still below the minimum.
        let generator = Arc::new(ScriptedGenerator::new(vec![Ok("θ".repeat(19))]));
        let error = orchestrator(index_with(Vec::new()), generator)
            .run(image_request())
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            GenerationError::InsufficientExtraction { characters: 19, .. }
        ));
    }

    #[tokio::test]
    async fn empty_image_is_invalid() {
        let generator = Arc::new(ScriptedGenerator::new(Vec::new()));
        let error = orchestrator(index_with(Vec::new()), generator.clone())
            .run(GenerationRequest::Image(ImageRequest {
                image_bytes: Vec::new(),
                mime_type: "image/png".into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), "invalid_request");
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn blank_gemini_transcription_is_insufficient_extraction() {
        let server = httpmock::MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::POST)
                    .path("/v1beta/models/gemini-1.5-flash:generateContent");
                then.status(200).json_body(json!({
                    "candidates": [{ "content": { "parts": [{ "text": "" }] } }]
                }));
            })
            .await;

        let generator = Arc::new(
            GeminiClient::new(server.base_url(), "g-test".into(), "gemini-1.5-flash".into())
                .expect("client"),
        );
        let embedder: Arc<dyn EmbeddingClient> = Arc::new(HashingEmbeddingClient::new(DIMENSION));
        let error = Orchestrator::new(
            Retriever::new(embedder, index_with(Vec::new()), DIMENSION),
            generator,
            OrchestratorSettings::default(),
        )
        .run(image_request())
        .await
        .unwrap_err();

        assert_eq!(error.kind(), "insufficient_extraction");
        assert!(matches!(
            error,
            GenerationError::InsufficientExtraction { characters: 0, minimum: 20 }
        ));
    }
}
