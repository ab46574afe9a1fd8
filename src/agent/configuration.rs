//! Research agent configuration.

use serde::{Deserialize, Serialize};

use crate::models::{FLASH_MODEL, PRO_MODEL};

/// Models and budgets used by the research agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfiguration {
    /// Model that writes search queries and runs grounded web research
    #[serde(default = "default_query_generator_model")]
    pub query_generator_model: String,

    /// Model that reflects on gathered summaries
    #[serde(default = "default_reflection_model")]
    pub reflection_model: String,

    /// Model that writes the final answer
    #[serde(default = "default_answer_model")]
    pub answer_model: String,

    /// Queries generated in the first round when the request does not say
    #[serde(default = "default_initial_queries")]
    pub number_of_initial_queries: usize,

    /// Loop budget when the request does not say
    #[serde(default = "default_max_loops")]
    pub max_research_loops: usize,
}

impl Default for AgentConfiguration {
    fn default() -> Self {
        Self {
            query_generator_model: default_query_generator_model(),
            reflection_model: default_reflection_model(),
            answer_model: default_answer_model(),
            number_of_initial_queries: default_initial_queries(),
            max_research_loops: default_max_loops(),
        }
    }
}

fn default_query_generator_model() -> String {
    FLASH_MODEL.to_string()
}

fn default_reflection_model() -> String {
    FLASH_MODEL.to_string()
}

fn default_answer_model() -> String {
    PRO_MODEL.to_string()
}

fn default_initial_queries() -> usize {
    3
}

fn default_max_loops() -> usize {
    2
}

impl AgentConfiguration {
    /// Key material identifying these settings in the result cache
    pub fn cache_namespace(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.query_generator_model,
            self.reflection_model,
            self.answer_model,
            self.number_of_initial_queries,
            self.max_research_loops
        )
    }

    /// Apply overrides from upper-case environment variables
    /// (`QUERY_GENERATOR_MODEL`, `REFLECTION_MODEL`, `ANSWER_MODEL`,
    /// `NUMBER_OF_INITIAL_QUERIES`, `MAX_RESEARCH_LOOPS`)
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(model) = non_empty("QUERY_GENERATOR_MODEL") {
            self.query_generator_model = model;
        }
        if let Some(model) = non_empty("REFLECTION_MODEL") {
            self.reflection_model = model;
        }
        if let Some(model) = non_empty("ANSWER_MODEL") {
            self.answer_model = model;
        }

        for (name, slot) in [
            (
                "NUMBER_OF_INITIAL_QUERIES",
                &mut self.number_of_initial_queries,
            ),
            ("MAX_RESEARCH_LOOPS", &mut self.max_research_loops),
        ] {
            if let Some(raw) = non_empty(name) {
                match raw.trim().parse::<usize>() {
                    Ok(value) => *slot = value,
                    Err(_) => tracing::warn!("Ignoring {}={:?}: not a number", name, raw),
                }
            }
        }

        self
    }
}
