//! Validation of raw model output into typed question sets.

use super::types::{
    BLANK_MARKER, FillInTheBlankQuestion, McqOption, MultipleChoiceQuestion, OPTION_COUNT,
    QuestionSet, QuestionType,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Reasons a model response was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedOutput {
    /// The unwrapped text is not JSON.
    #[error("response is not valid JSON: {0}")]
    InvalidJson(String),
    /// The top-level JSON value is not an array.
    #[error("response is not a JSON array")]
    NotAnArray,
    /// An element does not match the expected question schema.
    #[error("question {index} violates the {question_type} schema: {reason}")]
    SchemaViolation {
        /// Zero-based position of the offending element.
        index: usize,
        /// Expected question type.
        question_type: QuestionType,
        /// Human-readable cause.
        reason: String,
    },
}

impl MalformedOutput {
    /// Stable label distinguishing parse failures from schema failures.
    pub fn cause(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "invalid_json",
            Self::NotAnArray => "not_an_array",
            Self::SchemaViolation { .. } => "schema_violation",
        }
    }
}

/// Strip surrounding whitespace and markdown code fences from a model response.
///
/// Only a leading fence (optionally tagged, e.g. `json`) and a trailing fence are removed;
/// the interior is returned untouched.
pub fn unwrap_generator_noise(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the language tag that may follow the opening fence.
        let tag_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        text = if is_fence_tag(&rest[..tag_end]) {
            &rest[tag_end..]
        } else {
            rest
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

fn is_fence_tag(candidate: &str) -> bool {
    candidate
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic())
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Parse and validate a model response as questions of `expected` type.
///
/// The whole array is rejected when any element fails validation.
pub fn parse_questions(raw: &str, expected: QuestionType) -> Result<QuestionSet, MalformedOutput> {
    let body = unwrap_generator_noise(raw);
    let value: Value =
        serde_json::from_str(body).map_err(|error| MalformedOutput::InvalidJson(error.to_string()))?;
    let Value::Array(items) = value else {
        return Err(MalformedOutput::NotAnArray);
    };

    match expected {
        QuestionType::MultipleChoice => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| validate_multiple_choice(item).map_err(|reason| violation(index, expected, reason)))
            .collect::<Result<Vec<_>, _>>()
            .map(QuestionSet::MultipleChoice),
        QuestionType::FillInTheBlank => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| validate_fill_in_the_blank(item).map_err(|reason| violation(index, expected, reason)))
            .collect::<Result<Vec<_>, _>>()
            .map(QuestionSet::FillInTheBlank),
    }
}

fn violation(index: usize, question_type: QuestionType, reason: String) -> MalformedOutput {
    MalformedOutput::SchemaViolation {
        index,
        question_type,
        reason,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawMultipleChoice {
    text: String,
    options: Vec<McqOption>,
    correct_answer: i64,
    #[serde(default)]
    answer_inferred: bool,
}

fn decode<T: DeserializeOwned>(item: Value) -> Result<T, String> {
    if !item.is_object() {
        return Err("element is not a JSON object".to_string());
    }
    serde_json::from_value(item).map_err(|error| error.to_string())
}

fn validate_multiple_choice(item: Value) -> Result<MultipleChoiceQuestion, String> {
    let raw: RawMultipleChoice = decode(item)?;
    let option_count = raw.options.len();
    let options: [McqOption; OPTION_COUNT] = raw
        .options
        .try_into()
        .map_err(|_| format!("expected {OPTION_COUNT} options, found {option_count}"))?;
    let correct_answer = u8::try_from(raw.correct_answer)
        .ok()
        .filter(|answer| usize::from(*answer) < OPTION_COUNT)
        .ok_or_else(|| {
            format!(
                "correctAnswer must be between 0 and {}, found {}",
                OPTION_COUNT - 1,
                raw.correct_answer
            )
        })?;

    Ok(MultipleChoiceQuestion {
        text: raw.text,
        options,
        correct_answer,
        answer_inferred: raw.answer_inferred,
    })
}

fn validate_fill_in_the_blank(item: Value) -> Result<FillInTheBlankQuestion, String> {
    let question: FillInTheBlankQuestion = decode(item)?;
    if !question.text.contains(BLANK_MARKER) {
        return Err(format!("text does not contain the blank marker \"{BLANK_MARKER}\""));
    }
    Ok(question)
}
