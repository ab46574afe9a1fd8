//! Handler for the `deep_search` tool.

use std::sync::Arc;

use serde_json::Value;

use super::tools::{ToolError, ToolHandler};
use crate::agent::{error_result, ResearchAgent};
use crate::models::Effort;
use crate::utils::{CacheResult, CacheService};

/// Runs the research agent for a query, with optional result caching
#[derive(Debug, Clone)]
pub struct DeepSearchHandler {
    agent: Arc<ResearchAgent>,
    cache: CacheService,
}

impl DeepSearchHandler {
    pub fn new(agent: Arc<ResearchAgent>, cache: CacheService) -> Self {
        Self { agent, cache }
    }
}

/// Extract `(query, effort)` from tool arguments
fn parse_args(args: &Value) -> Result<(String, Effort), ToolError> {
    let query = args
        .get("query")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' parameter".to_string()))?;

    let effort = match args.get("effort") {
        None | Some(Value::Null) => Effort::default(),
        Some(Value::String(s)) => s
            .parse::<Effort>()
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?,
        Some(other) => {
            return Err(ToolError::InvalidArguments(format!(
                "'effort' must be a string, got {}",
                other
            )))
        }
    };

    Ok((query.to_string(), effort))
}

#[async_trait::async_trait]
impl ToolHandler for DeepSearchHandler {
    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let (query, effort) = parse_args(&args)?;

        let result = match self.cache.get(&query, effort) {
            CacheResult::Hit(result) => {
                tracing::info!("Serving deep search from cache");
                result
            }
            CacheResult::Miss | CacheResult::Expired => {
                match self.agent.research(&query, effort).await {
                    Ok(result) => {
                        self.cache.set(&query, effort, &result);
                        result
                    }
                    Err(e) => error_result(&e),
                }
            }
        };

        serde_json::to_value(result).map_err(|e| ToolError::Internal(e.to_string()))
    }
}
