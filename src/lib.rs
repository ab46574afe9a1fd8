//! # DeepSearch MCP
//!
//! A Model Context Protocol (MCP) server exposing a `deep_search` tool backed
//! by a multi-step web research agent running on Gemini with Google Search
//! grounding.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Effort levels, research state and tool results
//! - [`llm`]: The [`llm::LanguageModel`] trait and the Gemini REST client
//! - [`agent`]: Query generation, web research, reflection and answer writing
//! - [`mcp`]: MCP protocol implementation and server
//! - [`utils`]: HTTP client, retry and result cache
//! - [`config`]: Configuration management
//! - [`ui`]: Terminal output for the command line

pub mod agent;
pub mod config;
pub mod llm;
pub mod mcp;
pub mod models;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use agent::{AgentConfiguration, ResearchAgent};
pub use models::{DeepSearchResult, Effort};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
