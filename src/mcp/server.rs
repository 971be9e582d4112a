//! MCP server bootstrap and request dispatch.

use std::{borrow::Cow, sync::Arc};

use crate::{
    config::Config,
    mcp::{
        format::{
            BackendSummary, SourcesSnapshot, health_payload, json_resource_contents,
            question_types_payload, serialize_json,
        },
        handlers::{
            extract::handle_extract, generate::handle_generate, ingest::handle_ingest,
            map_ingest_error, metrics::handle_metrics,
        },
        registry, schemas,
    },
    service::ExamForgeApi,
};
use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, ListResourcesResult, ListToolsResult,
        RawResource, ReadResourceRequestParam, ReadResourceResult, Resource, ServerCapabilities,
        ServerInfo, Tool, ToolAnnotations,
    },
};

const QUESTION_TYPES_URI: &str = "mcp://question-types";
const HEALTH_URI: &str = "mcp://health";
const SOURCES_URI: &str = "mcp://sources";

/// MCP server exposing question generation and corpus ingestion.
#[derive(Clone)]
pub struct ExamForgeMcpServer {
    service: Arc<dyn ExamForgeApi>,
    backends: Arc<BackendSummary>,
    registry: Arc<registry::Registry>,
}

impl ExamForgeMcpServer {
    /// Create a server over `service`; `config` only feeds the health resource.
    pub fn new(service: Arc<dyn ExamForgeApi>, config: &Config) -> Self {
        let registry = registry::Registry::default()
            .with_resource(QUESTION_TYPES_URI, resource_question_types)
            .with_resource(HEALTH_URI, resource_health)
            .with_resource(SOURCES_URI, resource_sources)
            .with_tool("generate-questions", tool_generate)
            .with_tool("extract-questions", tool_extract)
            .with_tool("ingest-book", tool_ingest)
            .with_tool("metrics", tool_metrics);

        Self {
            service,
            backends: Arc::new(BackendSummary::from_config(config)),
            registry: Arc::new(registry),
        }
    }

    fn describe_tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: Cow::Borrowed("generate-questions"),
                title: Some("Generate Questions".to_string()),
                description: Some(Cow::Borrowed(
                    "Write multiple-choice or fill-in-the-blank questions about a topic, grounded only in retrieved textbook passages.",
                )),
                input_schema: Arc::new(schemas::generate_input_schema()),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Generate Questions")
                        .read_only(true)
                        .idempotent(false)
                        .open_world(true),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("extract-questions"),
                title: Some("Extract Questions From Image".to_string()),
                description: Some(Cow::Borrowed(
                    "Transcribe a photographed question paper and return its questions as validated multiple-choice items.",
                )),
                input_schema: Arc::new(schemas::extract_input_schema()),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Extract Questions From Image")
                        .read_only(true)
                        .idempotent(false)
                        .open_world(true),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("ingest-book"),
                title: Some("Ingest Book".to_string()),
                description: Some(Cow::Borrowed(
                    "Add a textbook to the corpus: split off solutions, chunk, embed and index it.",
                )),
                input_schema: Arc::new(schemas::ingest_input_schema()),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Ingest Book")
                        .destructive(false)
                        .idempotent(true)
                        .open_world(false),
                ),
                icons: None,
            },
            Tool {
                name: Cow::Borrowed("metrics"),
                title: Some("Metrics Snapshot".to_string()),
                description: Some(Cow::Borrowed(
                    "Request, failure and ingestion counters since startup.",
                )),
                input_schema: Arc::new(schemas::empty_object_schema()),
                output_schema: None,
                annotations: Some(
                    ToolAnnotations::with_title("Metrics Snapshot")
                        .read_only(true)
                        .idempotent(true)
                        .open_world(false),
                ),
                icons: None,
            },
        ]
    }

    fn describe_resources(&self) -> Vec<Resource> {
        let mut question_types = RawResource::new(QUESTION_TYPES_URI, "question-types");
        question_types.description =
            Some("JSON schema and prompt clause for each supported question type".into());

        let mut health = RawResource::new(HEALTH_URI, "health");
        health.description =
            Some("Embedding and generation backends plus Qdrant reachability".into());

        let mut sources = RawResource::new(SOURCES_URI, "sources");
        sources.description = Some("Distinct books currently indexed in the corpus".into());

        vec![
            question_types.no_annotation(),
            health.no_annotation(),
            sources.no_annotation(),
        ]
    }
}

fn resource_question_types(
    _server: &ExamForgeMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    Box::pin(async move {
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                QUESTION_TYPES_URI,
                question_types_payload(),
            )],
        })
    })
}

fn resource_health(
    server: &ExamForgeMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    let service = server.service.clone();
    let backends = server.backends.clone();
    Box::pin(async move {
        let health = service.corpus_health().await;
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                HEALTH_URI,
                health_payload(&backends, &health),
            )],
        })
    })
}

fn resource_sources(
    server: &ExamForgeMcpServer,
    _request: ReadResourceRequestParam,
) -> registry::ResourceFuture {
    let service = server.service.clone();
    Box::pin(async move {
        let sources = service.list_sources().await.map_err(map_ingest_error)?;
        let payload = SourcesSnapshot {
            sources: sources.into_iter().collect(),
        };
        Ok(ReadResourceResult {
            contents: vec![json_resource_contents(
                SOURCES_URI,
                serialize_json(&payload, SOURCES_URI),
            )],
        })
    })
}

fn tool_generate(server: &ExamForgeMcpServer, request: CallToolRequestParam) -> registry::ToolFuture {
    let service = server.service.clone();
    Box::pin(async move { handle_generate(service.as_ref(), request.arguments).await })
}

fn tool_extract(server: &ExamForgeMcpServer, request: CallToolRequestParam) -> registry::ToolFuture {
    let service = server.service.clone();
    Box::pin(async move { handle_extract(service.as_ref(), request.arguments).await })
}

fn tool_ingest(server: &ExamForgeMcpServer, request: CallToolRequestParam) -> registry::ToolFuture {
    let service = server.service.clone();
    Box::pin(async move { handle_ingest(service.as_ref(), request.arguments).await })
}

fn tool_metrics(
    server: &ExamForgeMcpServer,
    _request: CallToolRequestParam,
) -> registry::ToolFuture {
    let service = server.service.clone();
    Box::pin(async move { handle_metrics(service.as_ref()).await })
}

impl ServerHandler for ExamForgeMcpServer {
    fn get_info(&self) -> ServerInfo {
        let mut implementation = rmcp::model::Implementation::from_build_env();
        implementation.name = "examforge".to_string();
        implementation.title = Some("ExamForge MCP".to_string());
        implementation.version = env!("CARGO_PKG_VERSION").to_string();

        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: implementation,
            instructions: Some(
                "Generate exam questions grounded in an indexed textbook corpus, or extract them from a photographed question paper. Read mcp://question-types for the output shapes and mcp://sources for the indexed books.".into(),
            ),
            ..ServerInfo::default()
        }
    }

    fn list_resources(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        let resources = self.describe_resources();
        std::future::ready(Ok(ListResourcesResult::with_all_items(resources)))
    }

    fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = self.describe_tools();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    #[allow(clippy::manual_async_fn)]
    fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            if let Some(handler) = self.registry.resource(&request.uri) {
                return handler(self, request).await;
            }

            Err(McpError::invalid_params(
                format!("Unknown resource URI: {}", request.uri),
                None,
            ))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            if let Some(handler) = self.registry.tool(request.name.as_ref()) {
                return handler(self, request).await;
            }

            Err(McpError::invalid_params(
                format!("Unknown tool: {}", request.name),
                None,
            ))
        }
    }
}
