//! Model Context Protocol (MCP) integration for ExamForge.
//!
//! Agent hosts reach the generation pipeline and the corpus over stdio:
//!
//! - Tools: `generate-questions`, `extract-questions`, `ingest-book`, and `metrics`.
//! - Resources: `mcp://question-types`, `mcp://health`, and `mcp://sources`.
//!
//! Caller mistakes come back as `invalid_params` and backend failures as `internal_error`; both
//! carry `{ "kind": ... }` in the error data.

mod format;
mod handlers;
mod registry;
mod schemas;
mod server;

pub use server::ExamForgeMcpServer;
