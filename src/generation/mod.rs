//! Generative model clients used for question generation and image transcription.
//!
//! Each client issues exactly one HTTP request per call and never retries; callers decide what a
//! failure means. Images travel as base64 alongside the text prompt.

use crate::config::{Config, DEFAULT_GEMINI_BASE_URL, GenerationProvider, get_config};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Errors surfaced by generative backends.
#[derive(Debug, Error)]
pub enum GenerativeClientError {
    /// Provider could not be reached or is not configured.
    #[error("Generative provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Generation request failed: {0}")]
    GenerationFailed(String),
    /// Provider response could not be decoded.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Image attached to a generation call.
#[derive(Clone, Copy)]
pub struct ImagePart<'a> {
    /// Raw image bytes; encoded to base64 on the wire.
    pub bytes: &'a [u8],
    /// MIME type of the image, e.g. `image/png`.
    pub mime_type: &'a str,
}

impl std::fmt::Debug for ImagePart<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePart")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

impl ImagePart<'_> {
    fn encoded(&self) -> String {
        BASE64.encode(self.bytes)
    }
}

/// Interface implemented by generative backends.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Send a prompt, optionally with one image, and return the model's raw text.
    async fn generate(
        &self,
        prompt: &str,
        image: Option<ImagePart<'_>>,
    ) -> Result<String, GenerativeClientError>;
}

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Build a client for the given API host, key, and model.
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
    ) -> Result<Self, GenerativeClientError> {
        let http = Client::builder()
            .user_agent("examforge/generate")
            .build()
            .map_err(|error| GenerativeClientError::ProviderUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url,
            api_key,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        image: Option<ImagePart<'_>>,
    ) -> Result<String, GenerativeClientError> {
        let mut parts = vec![json!({ "text": prompt })];
        if let Some(image) = image {
            parts.push(json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": image.encoded(),
                }
            }));
        }
        tracing::debug!(
            model = %self.model,
            prompt_chars = prompt.len(),
            with_image = image.is_some(),
            "Calling Gemini generateContent"
        );

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&json!({ "contents": [{ "role": "user", "parts": parts }] }))
            .send()
            .await
            .map_err(|error| {
                GenerativeClientError::ProviderUnavailable(format!(
                    "failed to reach Gemini at {}: {}",
                    self.base_url,
                    error.without_url()
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerativeClientError::GenerationFailed(format!(
                "Gemini returned {status}: {body}"
            )));
        }

        let body: GeminiResponse = response.json().await.map_err(|error| {
            GenerativeClientError::InvalidResponse(format!(
                "failed to decode Gemini response: {}",
                error.without_url()
            ))
        })?;

        let Some(content) = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
        else {
            let feedback = body
                .prompt_feedback
                .map(|value| value.to_string())
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(GenerativeClientError::GenerationFailed(format!(
                "Gemini produced no content: {feedback}"
            )));
        };

        // Blank text is a valid reply; the pipeline decides what it means.
        Ok(content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect())
    }
}

/// Client for the Ollama `/api/generate` endpoint (vision models accept `images`).
pub struct OllamaGenerationClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaGenerationClient {
    /// Build a client targeting the given Ollama runtime and model.
    pub fn new(base_url: String, model: String) -> Result<Self, GenerativeClientError> {
        let http = Client::builder()
            .user_agent("examforge/generate")
            .build()
            .map_err(|error| GenerativeClientError::ProviderUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl GenerativeClient for OllamaGenerationClient {
    async fn generate(
        &self,
        prompt: &str,
        image: Option<ImagePart<'_>>,
    ) -> Result<String, GenerativeClientError> {
        let mut payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        if let Some(image) = image {
            payload["images"] = json!([image.encoded()]);
        }

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerativeClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerativeClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerativeClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            GenerativeClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(GenerativeClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response)
    }
}

/// Build a generative client for the supplied configuration.
pub fn build_generative_client(
    config: &Config,
) -> Result<Box<dyn GenerativeClient>, GenerativeClientError> {
    tracing::debug!(
        provider = ?config.generation_provider,
        model = %config.generation_model,
        "Building generative client"
    );
    Ok(match config.generation_provider {
        GenerationProvider::Gemini => {
            let api_key = config.gemini_api_key.clone().ok_or_else(|| {
                GenerativeClientError::ProviderUnavailable("GEMINI_API_KEY is not set".into())
            })?;
            Box::new(GeminiClient::new(
                config
                    .gemini_base_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
                api_key,
                config.generation_model.clone(),
            )?)
        }
        GenerationProvider::Ollama => Box::new(OllamaGenerationClient::new(
            config.ollama_base_url(),
            config.generation_model.clone(),
        )?),
    })
}

/// Build a generative client for the current global configuration.
pub fn get_generative_client() -> Result<Box<dyn GenerativeClient>, GenerativeClientError> {
    build_generative_client(get_config())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G'];

    #[tokio::test]
    async fn gemini_client_concatenates_candidate_parts() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-1.5-flash:generateContent")
                    .header("x-goog-api-key", "g-test")
                    .body_contains("\"text\":\"Write questions\"");
                then.status(200).json_body(json!({
                    "candidates": [{
                        "content": {
                            "role": "model",
                            "parts": [{ "text": "[{\"text\":" }, { "text": " \"q\"}]" }]
                        },
                        "finishReason": "STOP"
                    }]
                }));
            })
            .await;

        let client = GeminiClient::new(
            server.base_url(),
            "g-test".into(),
            "gemini-1.5-flash".into(),
        )
        .expect("client");
        let text = client
            .generate("Write questions", None)
            .await
            .expect("generation");

        mock.assert();
        assert_eq!(text, "[{\"text\": \"q\"}]");
    }

    #[tokio::test]
    async fn gemini_client_sends_inline_image_data() {
        let server = MockServer::start_async().await;
        let encoded = BASE64.encode(PNG_MAGIC);
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-1.5-flash:generateContent")
                    .body_contains("\"mimeType\":\"image/png\"")
                    .body_contains(format!("\"data\":\"{encoded}\""));
                then.status(200).json_body(json!({
                    "candidates": [{ "content": { "parts": [{ "text": "1. What is g?" }] } }]
                }));
            })
            .await;

        let client = GeminiClient::new(
            server.base_url(),
            "g-test".into(),
            "gemini-1.5-flash".into(),
        )
        .expect("client");
        let text = client
            .generate(
                "Transcribe",
                Some(ImagePart {
                    bytes: PNG_MAGIC,
                    mime_type: "image/png",
                }),
            )
            .await
            .expect("generation");

        mock.assert();
        assert_eq!(text, "1. What is g?");
    }

    #[tokio::test]
    async fn gemini_client_reports_blocked_prompts() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-1.5-flash:generateContent");
                then.status(200).json_body(json!({
                    "promptFeedback": { "blockReason": "SAFETY" }
                }));
            })
            .await;

        let client = GeminiClient::new(
            server.base_url(),
            "g-test".into(),
            "gemini-1.5-flash".into(),
        )
        .expect("client");
        let error = client.generate("prompt", None).await.unwrap_err();
        assert!(
            matches!(error, GenerativeClientError::GenerationFailed(ref message) if message.contains("SAFETY"))
        );
    }

    #[tokio::test]
    async fn gemini_client_keeps_api_key_out_of_errors() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-1.5-flash:generateContent")
                    .header("x-goog-api-key", "SECRET-KEY-123");
                then.status(200).body("not json");
            })
            .await;

        let client = GeminiClient::new(
            server.base_url(),
            "SECRET-KEY-123".into(),
            "gemini-1.5-flash".into(),
        )
        .expect("client");
        let decode_error = client.generate("prompt", None).await.unwrap_err();
        mock.assert();
        assert!(matches!(decode_error, GenerativeClientError::InvalidResponse(_)));
        assert!(!decode_error.to_string().contains("SECRET-KEY-123"));

        let unreachable = GeminiClient::new(
            "http://127.0.0.1:9".into(),
            "SECRET-KEY-123".into(),
            "gemini-1.5-flash".into(),
        )
        .expect("client");
        let transport_error = unreachable.generate("prompt", None).await.unwrap_err();
        assert!(matches!(
            transport_error,
            GenerativeClientError::ProviderUnavailable(_)
        ));
        assert!(!transport_error.to_string().contains("SECRET-KEY-123"));
        assert!(!format!("{transport_error:?}").contains("SECRET-KEY-123"));
    }

    #[tokio::test]
    async fn gemini_client_returns_blank_candidate_text() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-1.5-flash:generateContent");
                then.status(200).json_body(json!({
                    "candidates": [{ "content": { "parts": [{ "text": "" }] } }]
                }));
            })
            .await;

        let client = GeminiClient::new(
            server.base_url(),
            "g-test".into(),
            "gemini-1.5-flash".into(),
        )
        .expect("client");
        let text = client.generate("Transcribe", None).await.expect("blank text");
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn gemini_client_surfaces_quota_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-1.5-flash:generateContent");
                then.status(429).body("RESOURCE_EXHAUSTED");
            })
            .await;

        let client = GeminiClient::new(
            server.base_url(),
            "g-test".into(),
            "gemini-1.5-flash".into(),
        )
        .expect("client");
        let error = client.generate("prompt", None).await.unwrap_err();
        assert!(
            matches!(error, GenerativeClientError::GenerationFailed(ref message) if message.contains("429"))
        );
    }

    #[tokio::test]
    async fn ollama_client_handles_successful_response() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .body_contains("\"stream\":false")
                    .body_contains("\"model\":\"llava\"");
                then.status(200).json_body(json!({
                    "response": "[]",
                    "done": true
                }));
            })
            .await;

        let client =
            OllamaGenerationClient::new(server.base_url(), "llava".into()).expect("client");
        let text = client.generate("Write questions", None).await.expect("text");

        mock.assert();
        assert_eq!(text, "[]");
    }

    #[tokio::test]
    async fn ollama_client_attaches_images() {
        let server = MockServer::start_async().await;
        let encoded = BASE64.encode(PNG_MAGIC);
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .body_contains(format!("\"images\":[\"{encoded}\"]"));
                then.status(200).json_body(json!({
                    "response": "Q1. Define impulse.",
                    "done": true
                }));
            })
            .await;

        let client =
            OllamaGenerationClient::new(server.base_url(), "llava".into()).expect("client");
        let text = client
            .generate(
                "Transcribe",
                Some(ImagePart {
                    bytes: PNG_MAGIC,
                    mime_type: "image/png",
                }),
            )
            .await
            .expect("text");

        mock.assert();
        assert_eq!(text, "Q1. Define impulse.");
    }

    #[tokio::test]
    async fn ollama_client_handles_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(500).body("boom");
            })
            .await;

        let client =
            OllamaGenerationClient::new(server.base_url(), "llava".into()).expect("client");
        let error = client.generate("prompt", None).await.unwrap_err();
        assert!(
            matches!(error, GenerativeClientError::GenerationFailed(ref message) if message.contains("500"))
        );
    }

    #[tokio::test]
    async fn ollama_client_rejects_incomplete_responses() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200)
                    .json_body(json!({ "response": "partial", "done": false }));
            })
            .await;

        let client =
            OllamaGenerationClient::new(server.base_url(), "llava".into()).expect("client");
        let error = client.generate("prompt", None).await.unwrap_err();
        assert!(matches!(error, GenerativeClientError::InvalidResponse(_)));
    }
}
