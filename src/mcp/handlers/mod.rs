//! Tool handlers for the MCP server.

use crate::{corpus::IngestError, pipeline::GenerationError};
use rmcp::{ErrorData as McpError, model::JsonObject};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

pub mod extract;
pub mod generate;
pub mod ingest;
pub mod metrics;

/// Parse structured arguments supplied to a tool invocation.
pub(crate) fn parse_arguments<T: DeserializeOwned>(
    arguments: Option<JsonObject>,
) -> Result<T, McpError> {
    let value = arguments
        .map(Value::Object)
        .unwrap_or_else(|| Value::Object(JsonObject::new()));
    serde_json::from_value(value).map_err(|err| {
        McpError::invalid_params(
            format!("Invalid arguments: {err}"),
            Some(json!({ "kind": "invalid_request" })),
        )
    })
}

/// Shorthand for a caller error tagged `invalid_request`.
pub(crate) fn invalid_request(message: impl Into<String>) -> McpError {
    McpError::invalid_params(message.into(), Some(json!({ "kind": "invalid_request" })))
}

/// Caller errors become `invalid_params`; everything else is an internal error.
pub(crate) fn map_generation_error(error: GenerationError) -> McpError {
    let data = Some(json!({ "kind": error.kind(), "stage": error.stage().to_string() }));
    if error.is_caller_error() {
        McpError::invalid_params(error.to_string(), data)
    } else {
        tracing::warn!(kind = error.kind(), error = %error, "Generation tool failed");
        McpError::internal_error(error.to_string(), data)
    }
}

pub(crate) fn map_ingest_error(error: IngestError) -> McpError {
    let data = Some(json!({ "kind": error.kind() }));
    match error {
        IngestError::InvalidBook(_) => McpError::invalid_params(error.to_string(), data),
        other => {
            tracing::warn!(kind = other.kind(), error = %other, "Ingest tool failed");
            McpError::internal_error(other.to_string(), data)
        }
    }
}
