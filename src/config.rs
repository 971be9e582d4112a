use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use thiserror::Error;

/// Default Ollama endpoint used when `OLLAMA_URL` is unset.
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
/// Default OpenAI-compatible API base.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Default Gemini API host.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Number of context chunks retrieved per topic request.
pub const DEFAULT_RETRIEVAL_TOP_K: usize = 5;
/// Minimum transcription length (characters) before an image is worth formatting.
pub const DEFAULT_EXTRACTION_MIN_CHARS: usize = 20;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the ExamForge services.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance holding the textbook corpus.
    pub qdrant_url: String,
    /// Name of the Qdrant collection used for corpus chunks.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Optional override for the automatic chunk size selection.
    pub text_splitter_chunk_size: Option<usize>,
    /// Optional token overlap between adjacent chunks.
    pub text_splitter_chunk_overlap: Option<usize>,
    /// Base URL of the Ollama runtime (embeddings and/or generation).
    pub ollama_url: Option<String>,
    /// API key for the OpenAI embeddings endpoint.
    pub openai_api_key: Option<String>,
    /// Optional override for the OpenAI-compatible API base.
    pub openai_base_url: Option<String>,
    /// Generative backend used for question generation and image transcription.
    pub generation_provider: GenerationProvider,
    /// Model identifier passed to the generative backend.
    pub generation_model: String,
    /// API key for Gemini.
    pub gemini_api_key: Option<String>,
    /// Optional override for the Gemini API host.
    pub gemini_base_url: Option<String>,
    /// Number of context chunks retrieved per topic request.
    pub retrieval_top_k: usize,
    /// Minimum transcription length accepted on the image path.
    pub extraction_min_chars: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted OpenAI embeddings API.
    OpenAI,
    /// Deterministic byte-hashing embeddings for offline use and tests.
    Hashing,
}

/// Supported generative backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    /// Google Gemini `generateContent` API.
    Gemini,
    /// Local Ollama runtime (`/api/generate`).
    Ollama,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env("QDRANT_COLLECTION_NAME")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: load_env("EMBEDDING_PROVIDER")?
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            embedding_model: load_env("EMBEDDING_MODEL")?,
            embedding_dimension: load_env("EMBEDDING_DIMENSION")?
                .parse()
                .map_err(|_| ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()))?,
            text_splitter_chunk_size: parse_optional("TEXT_SPLITTER_CHUNK_SIZE")?,
            text_splitter_chunk_overlap: parse_optional("TEXT_SPLITTER_CHUNK_OVERLAP")?,
            ollama_url: load_env_optional("OLLAMA_URL"),
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: load_env_optional("OPENAI_BASE_URL"),
            generation_provider: load_env("GENERATION_PROVIDER")?
                .parse()
                .map_err(|()| ConfigError::InvalidValue("GENERATION_PROVIDER".to_string()))?,
            generation_model: load_env("GENERATION_MODEL")?,
            gemini_api_key: load_env_optional("GEMINI_API_KEY"),
            gemini_base_url: load_env_optional("GEMINI_BASE_URL"),
            retrieval_top_k: parse_optional("RETRIEVAL_TOP_K")?
                .unwrap_or(DEFAULT_RETRIEVAL_TOP_K),
            extraction_min_chars: parse_optional("EXTRACTION_MIN_CHARS")?
                .unwrap_or(DEFAULT_EXTRACTION_MIN_CHARS),
            server_port: parse_optional("SERVER_PORT")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Cross-field checks that cannot be expressed per variable.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".into()));
        }
        if self.retrieval_top_k == 0 {
            return Err(ConfigError::InvalidValue("RETRIEVAL_TOP_K".into()));
        }
        if self.embedding_provider == EmbeddingProvider::OpenAI && self.openai_api_key.is_none() {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".into()));
        }
        if self.generation_provider == GenerationProvider::Gemini && self.gemini_api_key.is_none()
        {
            return Err(ConfigError::MissingVariable("GEMINI_API_KEY".into()));
        }
        Ok(())
    }

    /// Ollama base URL with the local default applied.
    pub fn ollama_base_url(&self) -> String {
        self.ollama_url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "hashing" => Ok(Self::Hashing),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for GenerationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        embedding_provider = ?config.embedding_provider,
        generation_provider = ?config.generation_provider,
        generation_model = %config.generation_model,
        retrieval_top_k = config.retrieval_top_k,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    // A second initialization (tests, multiple binaries in one process) keeps the first value.
    let _ = CONFIG.set(config);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_parse_case_insensitively() {
        assert_eq!("Ollama".parse::<EmbeddingProvider>(), Ok(EmbeddingProvider::Ollama));
        assert_eq!("OPENAI".parse::<EmbeddingProvider>(), Ok(EmbeddingProvider::OpenAI));
        assert_eq!("hashing".parse::<EmbeddingProvider>(), Ok(EmbeddingProvider::Hashing));
        assert!("cohere".parse::<EmbeddingProvider>().is_err());

        assert_eq!(" gemini ".parse::<GenerationProvider>(), Ok(GenerationProvider::Gemini));
        assert!("gpt".parse::<GenerationProvider>().is_err());
    }

    fn sample() -> Config {
        Config {
            qdrant_url: "http://127.0.0.1:6333".into(),
            qdrant_collection_name: "jee_books".into(),
            qdrant_api_key: None,
            embedding_provider: EmbeddingProvider::Hashing,
            embedding_model: "all-minilm".into(),
            embedding_dimension: 384,
            text_splitter_chunk_size: None,
            text_splitter_chunk_overlap: None,
            ollama_url: None,
            openai_api_key: None,
            openai_base_url: None,
            generation_provider: GenerationProvider::Ollama,
            generation_model: "llava".into(),
            gemini_api_key: None,
            gemini_base_url: None,
            retrieval_top_k: DEFAULT_RETRIEVAL_TOP_K,
            extraction_min_chars: DEFAULT_EXTRACTION_MIN_CHARS,
            server_port: None,
        }
    }

    #[test]
    fn validate_requires_provider_credentials() {
        assert!(sample().validate().is_ok());

        let gemini = Config {
            generation_provider: GenerationProvider::Gemini,
            ..sample()
        };
        assert!(matches!(
            gemini.validate(),
            Err(ConfigError::MissingVariable(name)) if name == "GEMINI_API_KEY"
        ));

        let openai = Config {
            embedding_provider: EmbeddingProvider::OpenAI,
            ..sample()
        };
        assert!(matches!(
            openai.validate(),
            Err(ConfigError::MissingVariable(name)) if name == "OPENAI_API_KEY"
        ));
    }

    #[test]
    fn validate_rejects_zero_sizes() {
        let zero_dimension = Config {
            embedding_dimension: 0,
            ..sample()
        };
        assert!(zero_dimension.validate().is_err());

        let zero_top_k = Config {
            retrieval_top_k: 0,
            ..sample()
        };
        assert!(zero_top_k.validate().is_err());
    }

    #[test]
    fn ollama_base_url_falls_back_to_local_default() {
        assert_eq!(sample().ollama_base_url(), DEFAULT_OLLAMA_URL);
        let custom = Config {
            ollama_url: Some("http://gpu-box:11434".into()),
            ..sample()
        };
        assert_eq!(custom.ollama_base_url(), "http://gpu-box:11434");
    }
}
