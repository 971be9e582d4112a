//! JSON schema builders for MCP tool inputs.

use crate::pipeline::QuestionType;
use serde_json::{Map, Value, json};

/// Input schema for `generate-questions`.
pub(crate) fn generate_input_schema() -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "topic".into(),
        string_schema("Topic to write questions about, e.g. 'projectile motion'"),
    );
    properties.insert(
        "num_questions".into(),
        json!({
            "type": "integer",
            "description": "How many questions to generate",
            "minimum": 1
        }),
    );
    properties.insert(
        "question_type".into(),
        json!({
            "type": "string",
            "description": "Shape of every generated question",
            "enum": QuestionType::ALL.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            "default": QuestionType::MultipleChoice.as_str()
        }),
    );
    properties.insert(
        "difficulty".into(),
        json!({
            "type": "string",
            "description": "Difficulty label passed to the generator",
            "default": "medium"
        }),
    );

    let mut schema = finalize_object_schema(properties, &["topic", "num_questions"]);
    schema.insert(
        "examples".into(),
        json!([{
            "topic": "rotational dynamics",
            "num_questions": 3,
            "question_type": "multiple-choice",
            "difficulty": "hard"
        }]),
    );
    schema
}

/// Input schema for `extract-questions`.
pub(crate) fn extract_input_schema() -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "image_base64".into(),
        string_schema("Photo of the question paper, base64-encoded (standard alphabet)"),
    );
    properties.insert(
        "mime_type".into(),
        json!({
            "type": "string",
            "description": "MIME type of the image",
            "examples": ["image/png", "image/jpeg"]
        }),
    );
    finalize_object_schema(properties, &["image_base64", "mime_type"])
}

/// Input schema for `ingest-book`.
pub(crate) fn ingest_input_schema() -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "title".into(),
        string_schema("Book title; stored as source_book on every chunk"),
    );
    properties.insert(
        "text".into(),
        string_schema("Full book text; a 'Solutions' header line starts the solutions section"),
    );
    properties.insert(
        "solutions".into(),
        string_schema("Optional companion solutions text indexed as solution chunks"),
    );
    finalize_object_schema(properties, &["title", "text"])
}

/// Schema for tools without arguments.
pub(crate) fn empty_object_schema() -> Map<String, Value> {
    finalize_object_schema(Map::new(), &[])
}

fn string_schema(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn finalize_object_schema(properties: Map<String, Value>, required: &[&str]) -> Map<String, Value> {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), json!(required));
    }
    schema.insert("additionalProperties".into(), Value::Bool(false));
    schema
}
