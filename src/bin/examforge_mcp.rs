//! MCP server entrypoint (stdio transport).
//!
//! Exposes question generation, image extraction and corpus ingestion to agent hosts over stdio.
//! Shares all runtime configuration with the HTTP binary. Stdout carries the protocol, so logs
//! only go to the log file.
use anyhow::{Context, Result};
use examforge::{config, logging, mcp::ExamForgeMcpServer, service::ExamForgeService};
use rmcp::{service::ServiceExt, transport::stdio};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    config::init_config();
    logging::init_tracing_without_stdout();

    let service = ExamForgeService::new()
        .await
        .context("failed to initialize ExamForge service")?;
    let server = ExamForgeMcpServer::new(Arc::new(service), config::get_config());

    let running = server
        .serve(stdio())
        .await
        .context("failed to start MCP server over stdio")?;

    running
        .waiting()
        .await
        .context("MCP server terminated unexpectedly")?;

    Ok(())
}
