//! Question generation pipeline: retrieval, prompting, generation and validation.
//!
//! The [`Orchestrator`] drives both request paths through one state machine. Topic requests are
//! grounded in corpus context found by the [`Retriever`]; image requests are transcribed and then
//! reformatted. Model output only leaves the pipeline after [`parse_questions`] accepts it.

mod error;
mod orchestrator;
mod prompt;
mod retriever;
mod types;
mod validator;

pub use error::GenerationError;
pub use orchestrator::{GenerationStage, Orchestrator, OrchestratorSettings};
pub use prompt::{
    build_formatting_prompt, build_generation_prompt, build_transcription_prompt, schema_clause,
};
pub use retriever::{CorpusIndex, QdrantCorpusIndex, Retriever};
pub use types::{
    BLANK_MARKER, ContextChunk, FillInTheBlankQuestion, GenerationRequest, GenerationResult,
    ImageRequest, McqOption, MultipleChoiceQuestion, OPTION_COUNT, QuestionSet, QuestionType,
    TopicRequest,
};
pub use validator::{MalformedOutput, parse_questions, unwrap_generator_noise};
