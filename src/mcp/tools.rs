//! Tool registry for MCP tools.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::deep_search::DeepSearchHandler;
use crate::agent::ResearchAgent;
use crate::models::Effort;
use crate::utils::CacheService;

/// Name of the deep search tool
pub const DEEP_SEARCH_TOOL: &str = "deep_search";

/// An MCP tool that can be called by the client
#[derive(Clone)]
pub struct Tool {
    /// Tool name (e.g., "deep_search")
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// JSON Schema for input parameters
    pub input_schema: serde_json::Value,

    /// Handler function to execute the tool
    pub handler: Arc<dyn ToolHandler>,
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

/// Errors a tool call can fail with
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// No tool with this name is registered
    #[error("Tool '{0}' not found")]
    NotFound(String),

    /// The arguments do not match the tool's schema
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The tool failed while running
    #[error("{0}")]
    Internal(String),
}

/// Handler for executing a tool
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync + std::fmt::Debug {
    /// Execute the tool with the given arguments
    async fn execute(&self, args: Value) -> Result<Value, ToolError>;
}

/// Registry for all MCP tools
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry exposing the deep search tool
    pub fn with_agent(agent: Arc<ResearchAgent>, cache: CacheService) -> Self {
        let mut registry = Self::new();

        registry.register(Tool {
            name: DEEP_SEARCH_TOOL.to_string(),
            description: "Perform a deep search on a given query using an advanced web research agent. \
                The agent generates search queries, researches them with Google Search, reflects on \
                knowledge gaps and follows up before writing an answer. Returns a dictionary containing \
                the answer to the query (with inline citations) and a list of sources used."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query string"
                    },
                    "effort": {
                        "type": "string",
                        "description": "Search effort",
                        "enum": Effort::ALL.map(|effort| effort.as_str()),
                        "default": Effort::default().as_str()
                    }
                },
                "required": ["query"]
            }),
            handler: Arc::new(DeepSearchHandler::new(agent, cache)),
        });

        registry
    }

    /// Register a tool
    pub fn register(&mut self, tool: Tool) {
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Get all tools
    pub fn all(&self) -> Vec<&Tool> {
        self.tools.values().collect()
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    /// Execute a tool by name
    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        tool.handler.execute(args).await
    }
}
