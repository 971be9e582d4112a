//! Handler for the metrics tool.

use crate::service::ExamForgeApi;
use rmcp::{ErrorData as McpError, model::CallToolResult};

/// Return the current request, failure and ingestion counters.
pub(crate) async fn handle_metrics(service: &dyn ExamForgeApi) -> Result<CallToolResult, McpError> {
    let snapshot = service.metrics_snapshot();
    let payload = serde_json::to_value(&snapshot)
        .map_err(|err| McpError::internal_error(err.to_string(), None))?;
    Ok(CallToolResult::structured(payload))
}
