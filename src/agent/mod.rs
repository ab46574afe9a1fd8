//! The web research agent behind the `deep_search` tool.
//!
//! The agent generates search queries for a question, researches each one
//! with Google Search grounding, reflects on what it found, loops on
//! follow-up queries while the budget allows, and finally writes a cited
//! answer.
//!
//! - [`configuration`]: models and default budgets
//! - [`prompts`]: prompt templates for each step
//! - [`citations`]: grounding metadata to citation markers and sources
//! - [`graph`]: the [`ResearchAgent`] that runs the steps

pub mod citations;
pub mod configuration;
pub mod graph;
pub mod prompts;

pub use configuration::AgentConfiguration;
pub use graph::{
    error_result, google_api_error_answer, NextStep, ResearchAgent, WebResearchOutput,
    WebSearchTask, UNEXPECTED_ERROR_ANSWER,
};
