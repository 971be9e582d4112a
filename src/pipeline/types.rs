//! Request, context, and question types flowing through the generation pipeline.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// Literal marker that every fill-in-the-blank question must contain.
pub const BLANK_MARKER: &str = "____";

/// Number of options carried by every multiple-choice question.
pub const OPTION_COUNT: usize = 4;

/// Shape of the questions produced for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    /// Four options, one correct.
    MultipleChoice,
    /// Sentence with a `____` blank and a single answer key.
    FillInTheBlank,
}

impl QuestionType {
    /// Every supported question type, in catalog order.
    pub const ALL: [QuestionType; 2] = [QuestionType::MultipleChoice, QuestionType::FillInTheBlank];

    /// Wire label used in requests and results.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple-choice",
            Self::FillInTheBlank => "fill-in-the-blank",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "multiple-choice" | "mcq" => Ok(Self::MultipleChoice),
            "fill-in-the-blank" | "fill-in-the-blanks" | "fib" => Ok(Self::FillInTheBlank),
            other => Err(format!("unsupported question type '{other}'")),
        }
    }
}

/// Generate questions about a topic from retrieved corpus context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRequest {
    /// Free-form topic, e.g. "projectile motion".
    pub topic: String,
    /// Number of questions requested.
    pub num_questions: NonZeroU32,
    /// Shape of every generated question.
    pub question_type: QuestionType,
    /// Difficulty label passed through to the prompt, e.g. "medium".
    pub difficulty: String,
}

/// Extract questions from a photographed question paper.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageRequest {
    /// Raw image bytes as uploaded.
    pub image_bytes: Vec<u8>,
    /// MIME type reported by the uploader, e.g. `image/png`.
    pub mime_type: String,
}

impl fmt::Debug for ImageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageRequest")
            .field("image_bytes", &format_args!("<{} bytes>", self.image_bytes.len()))
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Inbound request handled by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationRequest {
    /// Retrieval-augmented generation from a topic.
    Topic(TopicRequest),
    /// Transcription and reformatting of an image.
    Image(ImageRequest),
}

impl GenerationRequest {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Topic(_) => "topic",
            Self::Image(_) => "image",
        }
    }
}

impl From<TopicRequest> for GenerationRequest {
    fn from(request: TopicRequest) -> Self {
        Self::Topic(request)
    }
}

impl From<ImageRequest> for GenerationRequest {
    fn from(request: ImageRequest) -> Self {
        Self::Image(request)
    }
}

/// Retrieved snippet of corpus text, ranked by similarity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextChunk {
    /// Source text embedded verbatim in the prompt.
    pub text: String,
    /// 1-based rank, 1 being the most similar.
    pub relevance_rank: usize,
    /// Similarity score reported by the index.
    pub score: f32,
    /// Book the chunk came from, when recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// One answer option of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct McqOption {
    /// Option text shown to the student.
    pub text: String,
    /// Explanation of why the option is right or wrong; may be empty.
    pub solution: String,
}

/// Multiple-choice question with exactly four options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MultipleChoiceQuestion {
    /// Question stem.
    pub text: String,
    /// The four options, in display order.
    pub options: [McqOption; OPTION_COUNT],
    /// Zero-based index of the correct option.
    pub correct_answer: u8,
    /// Set when the model inferred the answer instead of reading it from the source.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub answer_inferred: bool,
}

impl MultipleChoiceQuestion {
    /// The option marked correct, or `None` when `correct_answer` is out of range.
    pub fn correct_option(&self) -> Option<&McqOption> {
        self.options.get(usize::from(self.correct_answer))
    }
}

/// Fill-in-the-blank question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FillInTheBlankQuestion {
    /// Sentence containing the `____` marker.
    pub text: String,
    /// Word or phrase that fills the blank.
    pub answer_key: String,
}

/// Homogeneous, validated set of generated questions.
///
/// Serialized as `{ "questionType": "...", "questions": [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "questionType", content = "questions", rename_all = "kebab-case")]
pub enum QuestionSet {
    /// Multiple-choice questions.
    MultipleChoice(Vec<MultipleChoiceQuestion>),
    /// Fill-in-the-blank questions.
    FillInTheBlank(Vec<FillInTheBlankQuestion>),
}

impl QuestionSet {
    /// Question type shared by every element.
    pub fn question_type(&self) -> QuestionType {
        match self {
            Self::MultipleChoice(_) => QuestionType::MultipleChoice,
            Self::FillInTheBlank(_) => QuestionType::FillInTheBlank,
        }
    }

    /// Number of questions in the set.
    pub fn len(&self) -> usize {
        match self {
            Self::MultipleChoice(questions) => questions.len(),
            Self::FillInTheBlank(questions) => questions.len(),
        }
    }

    /// Whether the set holds no questions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Output of a successful pipeline run.
pub type GenerationResult = QuestionSet;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn question_type_accepts_common_spellings() {
        assert_eq!(
            "multiple-choice".parse::<QuestionType>(),
            Ok(QuestionType::MultipleChoice)
        );
        assert_eq!("MCQ".parse::<QuestionType>(), Ok(QuestionType::MultipleChoice));
        assert_eq!(
            "fill_in_the_blank".parse::<QuestionType>(),
            Ok(QuestionType::FillInTheBlank)
        );
        assert!("essay".parse::<QuestionType>().is_err());
    }

    #[test]
    fn question_set_serializes_with_type_tag() {
        let set = QuestionSet::FillInTheBlank(vec![FillInTheBlankQuestion {
            text: "The SI unit of force is the ____.".into(),
            answer_key: "newton".into(),
        }]);
        let value = serde_json::to_value(&set).expect("serialize");
        assert_eq!(
            value,
            json!({
                "questionType": "fill-in-the-blank",
                "questions": [
                    { "text": "The SI unit of force is the ____.", "answerKey": "newton" }
                ]
            })
        );
    }

    #[test]
    fn answer_inferred_is_omitted_unless_set() {
        let option = |text: &str| McqOption {
            text: text.into(),
            solution: String::new(),
        };
        let mut question = MultipleChoiceQuestion {
            text: "g on Earth is approximately".into(),
            options: [
                option("9.8 m/s²"),
                option("1.6 m/s²"),
                option("3.7 m/s²"),
                option("24.8 m/s²"),
            ],
            correct_answer: 0,
            answer_inferred: false,
        };
        let plain = serde_json::to_value(&question).expect("serialize");
        assert!(plain.get("answerInferred").is_none());
        assert_eq!(plain["correctAnswer"], 0);

        question.answer_inferred = true;
        let flagged = serde_json::to_value(&question).expect("serialize");
        assert_eq!(flagged["answerInferred"], true);
        assert_eq!(
            question.correct_option().map(|option| option.text.as_str()),
            Some("9.8 m/s²")
        );

        question.correct_answer = 7;
        assert!(question.correct_option().is_none());
    }

    #[test]
    fn image_request_debug_hides_bytes() {
        let request = ImageRequest {
            image_bytes: vec![0xFF; 2048],
            mime_type: "image/jpeg".into(),
        };
        let rendered = format!("{request:?}");
        assert!(rendered.contains("<2048 bytes>"));
        assert!(!rendered.contains("255"));
    }
}
