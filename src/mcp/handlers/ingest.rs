//! Handler for the `ingest-book` tool.

use crate::service::ExamForgeApi;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use serde::Deserialize;
use serde_json::json;

use super::{map_ingest_error, parse_arguments};

/// Arguments accepted by `ingest-book`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct IngestToolRequest {
    pub(crate) title: String,
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) solutions: Option<String>,
}

/// Split, chunk, embed and index one book.
pub(crate) async fn handle_ingest(
    service: &dyn ExamForgeApi,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let IngestToolRequest {
        title,
        text,
        solutions,
    } = parse_arguments(arguments)?;

    let outcome = service
        .ingest_book(title.clone(), text, solutions)
        .await
        .map_err(map_ingest_error)?;

    Ok(CallToolResult::structured(json!({
        "status": "ok",
        "book": title,
        "contentChunks": outcome.content_chunks,
        "solutionChunks": outcome.solution_chunks,
        "skippedDuplicates": outcome.skipped_duplicates,
        "chunkSize": outcome.chunk_size,
    })))
}
