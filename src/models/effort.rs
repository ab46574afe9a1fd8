//! Search effort levels and the research budget each one maps to.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Model used for low and medium effort reasoning
pub const FLASH_MODEL: &str = "gemini-2.5-flash-preview-05-20";

/// Model used for high effort reasoning
pub const PRO_MODEL: &str = "gemini-2.5-pro-preview-05-06";

/// How much work the research agent should put into a query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    #[default]
    Low,
    Medium,
    High,
}

impl Effort {
    /// All effort levels, in increasing order
    pub const ALL: [Effort; 3] = [Effort::Low, Effort::Medium, Effort::High];

    /// Returns the wire name of the effort level
    pub fn as_str(&self) -> &'static str {
        match self {
            Effort::Low => "low",
            Effort::Medium => "medium",
            Effort::High => "high",
        }
    }
}

impl std::fmt::Display for Effort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown effort level
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid effort '{0}': expected one of low, medium, high")]
pub struct ParseEffortError(pub String);

impl FromStr for Effort {
    type Err = ParseEffortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Effort::Low),
            "medium" => Ok(Effort::Medium),
            "high" => Ok(Effort::High),
            _ => Err(ParseEffortError(s.to_string())),
        }
    }
}

/// Research budget derived from an effort level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffortSettings {
    /// Number of search queries generated in the first round
    pub initial_search_query_count: usize,

    /// Maximum number of reflection loops
    pub max_research_loops: usize,

    /// Model used for reflection and the final answer
    pub reasoning_model: String,
}

/// Get the research budget for an effort level
pub fn get_effort_settings(effort: Effort) -> EffortSettings {
    let (initial_search_query_count, max_research_loops, reasoning_model) = match effort {
        Effort::Low => (1, 1, FLASH_MODEL),
        Effort::Medium => (3, 2, FLASH_MODEL),
        Effort::High => (5, 3, PRO_MODEL),
    };

    EffortSettings {
        initial_search_query_count,
        max_research_loops,
        reasoning_model: reasoning_model.to_string(),
    }
}
