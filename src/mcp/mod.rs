//! MCP (Model Context Protocol) implementation.

mod deep_search;
pub mod server;
mod tools;

pub use deep_search::DeepSearchHandler;
pub use server::{McpServer, SERVER_NAME};
pub use tools::{Tool, ToolError, ToolHandler, ToolRegistry, DEEP_SEARCH_TOOL};
