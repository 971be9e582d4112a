//! Handler for the `generate-questions` tool.

use std::num::NonZeroU32;

use crate::{
    pipeline::{GenerationRequest, QuestionType, TopicRequest},
    service::ExamForgeApi,
};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use serde::Deserialize;

use super::{invalid_request, map_generation_error, parse_arguments};

const DEFAULT_DIFFICULTY: &str = "medium";

/// Arguments accepted by `generate-questions`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct GenerateToolRequest {
    pub(crate) topic: String,
    pub(crate) num_questions: u32,
    #[serde(default)]
    pub(crate) question_type: Option<String>,
    #[serde(default)]
    pub(crate) difficulty: Option<String>,
}

impl GenerateToolRequest {
    fn into_topic_request(self) -> Result<TopicRequest, McpError> {
        let num_questions = NonZeroU32::new(self.num_questions)
            .ok_or_else(|| invalid_request("`num_questions` must be at least 1"))?;
        let question_type = match self.question_type.as_deref() {
            Some(raw) => raw.parse::<QuestionType>().map_err(invalid_request)?,
            None => QuestionType::MultipleChoice,
        };
        let difficulty = self
            .difficulty
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_DIFFICULTY.to_string());
        Ok(TopicRequest {
            topic: self.topic,
            num_questions,
            question_type,
            difficulty,
        })
    }
}

/// Run a topic request through the pipeline and return the typed question set.
pub(crate) async fn handle_generate(
    service: &dyn ExamForgeApi,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: GenerateToolRequest = parse_arguments(arguments)?;
    let request = args.into_topic_request()?;
    tracing::info!(
        topic = %request.topic,
        num_questions = request.num_questions.get(),
        question_type = %request.question_type,
        "generate-questions invoked"
    );

    let result = service
        .generate(GenerationRequest::Topic(request))
        .await
        .map_err(map_generation_error)?;
    let payload = serde_json::to_value(&result)
        .map_err(|err| McpError::internal_error(err.to_string(), None))?;
    Ok(CallToolResult::structured(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::handlers::stub::{StubApi, one_mcq};
    use crate::pipeline::GenerationError;
    use rmcp::model::ErrorCode;
    use serde_json::json;

    fn args(value: serde_json::Value) -> Option<JsonObject> {
        value.as_object().cloned()
    }

    #[tokio::test]
    async fn forwards_topic_request_with_defaults() {
        let stub = StubApi::new(one_mcq);
        let result = handle_generate(
            &stub,
            args(json!({ "topic": "electrostatics", "num_questions": 1 })),
        )
        .await
        .expect("tool succeeds");

        let payload = result.structured_content.expect("structured payload");
        assert_eq!(payload["questionType"], "multiple-choice");
        assert_eq!(payload["questions"][0]["correctAnswer"], 0);

        let requests = stub.requests.lock().await;
        let GenerationRequest::Topic(request) = &requests[0] else {
            panic!("expected topic request");
        };
        assert_eq!(request.question_type, QuestionType::MultipleChoice);
        assert_eq!(request.difficulty, "medium");
    }

    #[tokio::test]
    async fn rejects_zero_questions_before_calling_the_pipeline() {
        let stub = StubApi::new(one_mcq);
        let error = handle_generate(
            &stub,
            args(json!({ "topic": "optics", "num_questions": 0 })),
        )
        .await
        .unwrap_err();
        assert_eq!(error.code, ErrorCode::INVALID_PARAMS);
        assert!(stub.requests.lock().await.is_empty());
    }

    #[tokio::test]
    async fn rejects_unknown_question_type() {
        let stub = StubApi::new(one_mcq);
        let error = handle_generate(
            &stub,
            args(json!({ "topic": "optics", "num_questions": 2, "question_type": "essay" })),
        )
        .await
        .unwrap_err();
        assert_eq!(error.code, ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn no_context_surfaces_as_invalid_params() {
        let stub = StubApi::new(|| {
            Err(GenerationError::NoContext {
                topic: "string theory".into(),
            })
        });
        let error = handle_generate(
            &stub,
            args(json!({ "topic": "string theory", "num_questions": 2 })),
        )
        .await
        .unwrap_err();
        assert_eq!(error.code, ErrorCode::INVALID_PARAMS);
        assert_eq!(error.data.expect("data")["kind"], "no_context");
    }
}
