//! Instruction templates for question generation and image extraction.
//!
//! Everything here is pure string construction. The per-type schema clause is the only part
//! that varies between question types; adding a type means adding a clause, not control flow.

use super::types::{BLANK_MARKER, ContextChunk, QuestionType};
use std::fmt::Write as _;

const CONTEXT_SEPARATOR: &str = "\n\n";

const MULTIPLE_CHOICE_CLAUSE: &str = r#"Each array element must be a JSON object with exactly these keys:
- "text": the question stem (string)
- "options": an array of exactly 4 objects, each with exactly the keys "text" (the option, string) and "solution" (why this option is right or wrong, string)
- "correctAnswer": the zero-based index of the correct option, an integer from 0 to 3"#;

const FILL_IN_THE_BLANK_CLAUSE: &str = r#"Each array element must be a JSON object with exactly these keys:
- "text": the sentence, containing the blank marker "____" exactly where the missing word or phrase belongs (string)
- "answerKey": the word or phrase that fills the blank (string)"#;

/// Required-key clause for a question type.
pub fn schema_clause(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::MultipleChoice => MULTIPLE_CHOICE_CLAUSE,
        QuestionType::FillInTheBlank => FILL_IN_THE_BLANK_CLAUSE,
    }
}

/// Render the retrieval-augmented generation prompt.
pub fn build_generation_prompt(
    topic: &str,
    context: &[ContextChunk],
    num_questions: u32,
    question_type: QuestionType,
    difficulty: &str,
) -> String {
    let noun = match question_type {
        QuestionType::MultipleChoice => "multiple-choice",
        QuestionType::FillInTheBlank => "fill-in-the-blank",
    };
    let context_text = context
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR);

    let mut prompt = String::with_capacity(context_text.len() + 1024);
    let _ = writeln!(
        prompt,
        "You are an experienced examiner writing practice questions about \"{topic}\"."
    );
    let _ = writeln!(
        prompt,
        "Use ONLY the information in the context below. Do not draw on outside knowledge."
    );
    let _ = writeln!(
        prompt,
        "Produce exactly {num_questions} {noun} questions at {difficulty} difficulty."
    );
    if question_type == QuestionType::FillInTheBlank {
        let _ = writeln!(
            prompt,
            "Mark the blank in every question with {BLANK_MARKER} (four underscores)."
        );
    }
    let _ = writeln!(
        prompt,
        "Output a raw JSON array and nothing else: no markdown, no code fences, no commentary."
    );
    prompt.push('\n');
    prompt.push_str(schema_clause(question_type));
    prompt.push_str("\n\nContext:\n");
    prompt.push_str(&context_text);
    prompt.push('\n');
    prompt
}

/// Prompt sent with the question-paper image.
pub fn build_transcription_prompt() -> String {
    [
        "Transcribe every exam question visible in this image exactly as written.",
        "Include each question's answer options and keep the original question numbering.",
        "Output plain text only. Do not answer, explain, or summarize the questions.",
    ]
    .join("\n")
}

/// Prompt that turns a transcription into the strict multiple-choice schema.
pub fn build_formatting_prompt(raw_text: &str) -> String {
    let mut prompt = String::with_capacity(raw_text.len() + 1024);
    prompt.push_str(
        "Reformat the transcribed exam questions below into a JSON array of multiple-choice questions.\n",
    );
    prompt.push_str(
        "Output a raw JSON array and nothing else: no markdown, no code fences, no commentary.\n\n",
    );
    prompt.push_str(schema_clause(QuestionType::MultipleChoice));
    prompt.push_str(
        "\n- \"answerInferred\": optional boolean; include it as true only when you had to infer the correct answer",
    );
    prompt.push_str("\n\nIf the correct answer is not stated, infer the most likely one and set \"answerInferred\" to true.");
    prompt.push_str("\nIf no explanation is given for an option, set its \"solution\" to an empty string.");
    prompt.push_str("\n\nTranscribed text:\n");
    prompt.push_str(raw_text);
    prompt.push('\n');
    prompt
}
