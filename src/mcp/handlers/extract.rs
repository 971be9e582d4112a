//! Handler for the `extract-questions` tool.

use crate::{
    pipeline::{GenerationRequest, ImageRequest},
    service::ExamForgeApi,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use serde::Deserialize;

use super::{invalid_request, map_generation_error, parse_arguments};

/// Arguments accepted by `extract-questions`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ExtractToolRequest {
    pub(crate) image_base64: String,
    pub(crate) mime_type: String,
}

/// Decode the image and run it through the extraction path.
pub(crate) async fn handle_extract(
    service: &dyn ExamForgeApi,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: ExtractToolRequest = parse_arguments(arguments)?;
    let encoded = strip_data_url(args.image_base64.trim());
    let image_bytes = BASE64
        .decode(encoded)
        .map_err(|err| invalid_request(format!("`image_base64` is not valid base64: {err}")))?;
    tracing::info!(
        mime_type = %args.mime_type,
        bytes = image_bytes.len(),
        "extract-questions invoked"
    );

    let result = service
        .generate(GenerationRequest::Image(ImageRequest {
            image_bytes,
            mime_type: args.mime_type,
        }))
        .await
        .map_err(map_generation_error)?;
    let payload = serde_json::to_value(&result)
        .map_err(|err| McpError::internal_error(err.to_string(), None))?;
    Ok(CallToolResult::structured(payload))
}

/// Accept `data:<mime>;base64,<payload>` as well as bare base64.
fn strip_data_url(value: &str) -> &str {
    if value.starts_with("data:")
        && let Some((_, payload)) = value.split_once(";base64,")
    {
        return payload;
    }
    value
}
