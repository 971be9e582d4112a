#![deny(missing_docs)]

//! Core library for ExamForge: exam question generation grounded in a textbook corpus.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Textbook discovery, sectioning, chunking and indexing.
pub mod corpus;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Generative model clients (Gemini, Ollama).
pub mod generation;
/// Structured logging and tracing setup.
pub mod logging;
/// Model Context Protocol server implementation.
pub mod mcp;
/// Request and ingestion counters.
pub mod metrics;
/// Retrieval, prompting, generation and validation of questions.
pub mod pipeline;
/// Qdrant vector store integration.
pub mod qdrant;
/// Application service shared by the HTTP and MCP surfaces.
pub mod service;
