//! Textbook corpus ingestion into the Qdrant collection used for retrieval.

pub mod chunking;
pub mod discovery;
pub mod sections;
mod service;
pub mod types;

pub use discovery::{BookFile, discover_books};
pub use service::{CorpusIngestor, IngestSettings};
pub use types::{BookSections, ChunkingError, ContentType, IngestError, IngestOutcome};
