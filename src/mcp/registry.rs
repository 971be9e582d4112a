//! Name-keyed dispatch tables for tools and static resources.

use std::{collections::BTreeMap, future::Future, pin::Pin};

use rmcp::ErrorData as McpError;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, ReadResourceRequestParam, ReadResourceResult,
};

use super::server::ExamForgeMcpServer;

pub type ResourceFuture =
    Pin<Box<dyn Future<Output = Result<ReadResourceResult, McpError>> + Send>>;
pub type ToolFuture = Pin<Box<dyn Future<Output = Result<CallToolResult, McpError>> + Send>>;

pub type ResourceHandler = fn(&ExamForgeMcpServer, ReadResourceRequestParam) -> ResourceFuture;
pub type ToolHandler = fn(&ExamForgeMcpServer, CallToolRequestParam) -> ToolFuture;

#[derive(Default)]
pub struct Registry {
    resources: BTreeMap<&'static str, ResourceHandler>,
    tools: BTreeMap<&'static str, ToolHandler>,
}

impl Registry {
    pub fn with_resource(mut self, uri: &'static str, handler: ResourceHandler) -> Self {
        self.resources.insert(uri, handler);
        self
    }

    pub fn with_tool(mut self, name: &'static str, handler: ToolHandler) -> Self {
        self.tools.insert(name, handler);
        self
    }

    pub fn resource(&self, uri: &str) -> Option<ResourceHandler> {
        self.resources.get(uri).copied()
    }

    pub fn tool(&self, name: &str) -> Option<ToolHandler> {
        self.tools.get(name).copied()
    }

    /// Registered tool names in sorted order.
    pub fn tool_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tools.keys().copied()
    }
}
