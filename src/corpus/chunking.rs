//! Token-budget chunking for textbook sections.
//!
//! Chunk sizes come from `TEXT_SPLITTER_CHUNK_SIZE` when set, otherwise a quarter of the
//! embedding model's context window clamped to `[256, 1024]` tokens. Token counting uses
//! `tiktoken-rs` when the model maps to a known encoding and whitespace counting otherwise.
//! Optional overlap (`TEXT_SPLITTER_CHUNK_OVERLAP`) splits at `chunk_size - overlap` tokens and
//! prepends the tail of the previous chunk, so every chunk stays within `chunk_size`.

use super::types::ChunkingError;
use crate::config::EmbeddingProvider;
use anyhow::Error as TokenizerError;
use semchunk_rs::Chunker;
use std::sync::Arc;
use tiktoken_rs::{
    CoreBPE, cl100k_base, get_bpe_from_model, model::get_context_size, o200k_base, p50k_base,
    r50k_base,
};

type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

const MIN_AUTOMATIC_CHUNK_SIZE: usize = 256;
const MAX_AUTOMATIC_CHUNK_SIZE: usize = 1024;
const HASHING_CONTEXT_WINDOW: usize = 2048;

/// Resolve the token budget per chunk.
pub(crate) fn determine_chunk_size(
    override_size: Option<usize>,
    provider: EmbeddingProvider,
    model: &str,
) -> usize {
    if let Some(explicit) = override_size {
        return explicit.max(1);
    }

    let window = embedding_context_window(provider, model);
    (window / 4).clamp(MIN_AUTOMATIC_CHUNK_SIZE, MAX_AUTOMATIC_CHUNK_SIZE)
}

/// Context window, in tokens, of the configured embedding model.
pub fn embedding_context_window(provider: EmbeddingProvider, model: &str) -> usize {
    match provider {
        EmbeddingProvider::OpenAI => openai_context_window(model),
        EmbeddingProvider::Ollama => ollama_context_window(model),
        EmbeddingProvider::Hashing => HASHING_CONTEXT_WINDOW,
    }
}

fn openai_context_window(model: &str) -> usize {
    if model.starts_with("text-embedding-3") || model.starts_with("text-embedding-ada-002") {
        return 8192;
    }
    get_context_size(model)
}

fn ollama_context_window(model: &str) -> usize {
    let normalized = model.to_lowercase();
    match normalized.as_str() {
        "nomic-embed-text" | "mxbai-embed-large" | "mxbai-embed-large-v1" => 8192,
        value if value.contains("all-minilm") => 512,
        value if value.contains("bge-m3") => 8192,
        value if value.contains("e5-large") => 4096,
        _ => {
            tracing::trace!(model, "Using default Ollama context window estimate");
            4096
        }
    }
}

/// Split `text` into chunks of at most `chunk_size` tokens.
///
/// Whitespace-only input yields no chunks.
pub(crate) fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    provider: EmbeddingProvider,
    model: &str,
) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let counter = build_token_counter(provider, model)?;
    Ok(chunk_with_counter(text, chunk_size, overlap, counter))
}

fn build_token_counter(
    provider: EmbeddingProvider,
    model: &str,
) -> Result<TokenCounter, ChunkingError> {
    match provider {
        EmbeddingProvider::OpenAI => tiktoken_counter(model),
        EmbeddingProvider::Ollama => tiktoken_counter(model).or_else(|error| {
            tracing::warn!(
                model,
                error = %error,
                "Tokenizer unavailable for Ollama model; counting whitespace tokens"
            );
            Ok(whitespace_counter())
        }),
        EmbeddingProvider::Hashing => Ok(whitespace_counter()),
    }
}

fn tiktoken_counter(model: &str) -> Result<TokenCounter, ChunkingError> {
    let target = match model.trim() {
        "" => "cl100k_base",
        trimmed => trimmed,
    };
    let encoding = resolve_encoding(target).map_err(|source| ChunkingError::Tokenizer {
        model: target.to_string(),
        source,
    })?;
    let encoding = Arc::new(encoding);
    Ok(Arc::new(move |segment: &str| {
        encoding.encode_ordinary(segment).len()
    }))
}

fn resolve_encoding(model: &str) -> Result<CoreBPE, TokenizerError> {
    if let Ok(encoding) = get_bpe_from_model(model) {
        return Ok(encoding);
    }
    match model {
        "o200k_base" => o200k_base(),
        "p50k_base" => p50k_base(),
        "r50k_base" | "gpt2" => r50k_base(),
        _ => {
            tracing::debug!(model, "Unknown tokenizer model; using cl100k_base");
            cl100k_base()
        }
    }
}

fn whitespace_counter() -> TokenCounter {
    Arc::new(|segment: &str| match segment.split_whitespace().count() {
        0 if !segment.is_empty() => 1,
        tokens => tokens,
    })
}

fn chunk_with_counter(
    text: &str,
    chunk_size: usize,
    overlap: usize,
    counter: TokenCounter,
) -> Vec<String> {
    let overlap = overlap.min(chunk_size.saturating_sub(1));
    // Leave room for the previous tail so the overlap survives the final budget trim.
    let chunker_counter = counter.clone();
    let chunker = Chunker::new(
        chunk_size - overlap,
        Box::new(move |segment: &str| chunker_counter.as_ref()(segment)),
    );
    let chunks = chunker.chunk(text);

    if overlap == 0 || chunks.len() < 2 {
        return chunks;
    }

    let mut overlapped = Vec::with_capacity(chunks.len());
    let mut previous: Option<String> = None;
    for current in chunks {
        let chunk = match &previous {
            Some(previous) => prepend_tail(previous, &current, overlap, chunk_size, &counter),
            None => current.clone(),
        };
        overlapped.push(chunk);
        previous = Some(current);
    }
    overlapped
}

/// Join the last `overlap` tokens of `previous` onto `current`, trimming to the budget.
fn prepend_tail(
    previous: &str,
    current: &str,
    overlap: usize,
    chunk_size: usize,
    counter: &TokenCounter,
) -> String {
    let tail = longest_suffix_within(previous, overlap, counter);
    let mut combined = String::with_capacity(tail.len() + current.len() + 1);
    if !tail.is_empty() {
        combined.push_str(tail);
        let needs_space = !tail.ends_with(char::is_whitespace)
            && !current.starts_with(char::is_whitespace);
        if needs_space {
            combined.push(' ');
        }
    }
    combined.push_str(current);
    longest_suffix_within(&combined, chunk_size, counter).to_string()
}

/// Longest whitespace-trimmed suffix of `text` counting at most `limit` tokens.
fn longest_suffix_within<'a>(text: &'a str, limit: usize, counter: &TokenCounter) -> &'a str {
    if limit == 0 {
        return "";
    }
    text.char_indices()
        .map(|(offset, _)| text[offset..].trim_start())
        .find(|candidate| counter.as_ref()(candidate) <= limit)
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_budget_splits_evenly() {
        let chunks = chunk_with_counter("one two three four five", 2, 0, whitespace_counter());
        assert_eq!(chunks, vec!["one two", "three four", "five"]);
    }

    #[test]
    fn overlap_repeats_previous_tail_within_budget() {
        let counter = whitespace_counter();
        let chunks = chunk_with_counter("one two three four five", 3, 1, counter.clone());
        assert_eq!(chunks, vec!["one two", "two three four", "four five"]);
        assert!(chunks.iter().all(|chunk| counter.as_ref()(chunk) <= 3));
    }

    #[test]
    fn overlap_survives_when_chunks_fill_the_budget() {
        let counter = whitespace_counter();
        let text = "a1 a2 b1 b2 c1 c2 d1 d2";
        let chunks = chunk_with_counter(text, 4, 2, counter.clone());
        assert_eq!(
            chunks,
            vec!["a1 a2", "a1 a2 b1 b2", "b1 b2 c1 c2", "c1 c2 d1 d2"]
        );
        assert!(chunks[1..].iter().all(|chunk| counter.as_ref()(chunk) == 4));
    }

    #[test]
    fn blank_text_has_no_chunks() {
        let chunks = chunk_text("  \n\x0c ", 64, 0, EmbeddingProvider::Hashing, "hashing")
            .expect("chunking");
        assert!(chunks.is_empty());
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let error = chunk_text("Kinematics", 0, 0, EmbeddingProvider::Hashing, "hashing")
            .unwrap_err();
        assert!(matches!(error, ChunkingError::InvalidChunkSize));
    }

    #[test]
    fn tiktoken_budget_is_respected_and_words_preserved() {
        let text = "A body continues in its state of rest or uniform motion unless acted upon.";
        let chunks = chunk_text(text, 6, 0, EmbeddingProvider::OpenAI, "text-embedding-3-small")
            .expect("chunking");
        let counter = tiktoken_counter("text-embedding-3-small").expect("counter");
        assert!(chunks.iter().all(|chunk| counter.as_ref()(chunk) <= 6));

        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.split_whitespace()).collect();
        let original: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(rejoined, original);
    }

    #[test]
    fn chunk_size_prefers_override_then_model_window() {
        assert_eq!(
            determine_chunk_size(Some(120), EmbeddingProvider::Ollama, "all-minilm"),
            120
        );
        assert_eq!(
            determine_chunk_size(None, EmbeddingProvider::Ollama, "all-minilm"),
            256
        );
        assert_eq!(
            determine_chunk_size(None, EmbeddingProvider::OpenAI, "text-embedding-3-small"),
            1024
        );
        assert_eq!(
            determine_chunk_size(None, EmbeddingProvider::Hashing, "anything"),
            512
        );
    }
}
