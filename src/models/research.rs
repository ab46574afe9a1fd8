//! Research state flowing through the agent graph, and the tool result.

use serde::{Deserialize, Serialize};

use super::effort::EffortSettings;

/// Answer returned when the agent finished without producing one
pub const NO_ANSWER: &str = "No answer generated.";

/// Author of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Assistant,
}

/// A message in the research conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a message from the user
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    /// Create a message from the agent
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A web source cited by the research agent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSegment {
    /// Short site label (e.g. "wikipedia")
    pub label: String,

    /// Placeholder URL used inside intermediate summaries
    pub short_url: String,

    /// Original URL of the source
    pub value: String,
}

/// A span of generated text backed by one or more sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Start of the supported span (UTF-8 byte offset)
    pub start_index: usize,

    /// End of the supported span (UTF-8 byte offset)
    pub end_index: usize,

    /// Sources backing the span
    pub segments: Vec<SourceSegment>,
}

/// Structured output of the query generation step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQueryList {
    /// Search queries to run
    #[serde(default)]
    pub query: Vec<String>,

    /// Why these queries are relevant
    #[serde(default)]
    pub rationale: String,
}

/// Structured output of the reflection step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reflection {
    /// Whether the gathered summaries answer the question
    pub is_sufficient: bool,

    /// What is missing or needs clarification
    #[serde(default)]
    pub knowledge_gap: String,

    /// Queries that would close the gap
    #[serde(default)]
    pub follow_up_queries: Vec<String>,
}

/// State accumulated while the agent researches a question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchState {
    /// Conversation so far; the last assistant message is the answer
    pub messages: Vec<Message>,

    /// Every search query that has been run
    pub search_query: Vec<String>,

    /// Annotated summaries, one per search query
    pub web_research_result: Vec<String>,

    /// Sources cited by the summaries (or by the answer once finalized)
    pub sources_gathered: Vec<SourceSegment>,

    /// Queries to generate in the first round (agent default when unset)
    pub initial_search_query_count: Option<usize>,

    /// Loop budget (agent default when unset)
    pub max_research_loops: Option<usize>,

    /// Reflection loops completed
    pub research_loop_count: usize,

    /// Model override for reflection and the final answer
    pub reasoning_model: Option<String>,

    /// Queries run before the latest reflection
    pub number_of_ran_queries: usize,

    /// Outcome of the latest reflection
    pub reflection: Option<Reflection>,
}

impl ResearchState {
    /// Build the initial state for a user query
    pub fn from_query(query: impl Into<String>, settings: &EffortSettings) -> Self {
        Self {
            messages: vec![Message::human(query)],
            initial_search_query_count: Some(settings.initial_search_query_count),
            max_research_loops: Some(settings.max_research_loops),
            reasoning_model: Some(settings.reasoning_model.clone()),
            ..Default::default()
        }
    }

    /// The agent's answer, if it produced one
    pub fn final_answer(&self) -> Option<&str> {
        self.messages
            .last()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }
}

/// Result of a deep search, as returned by the MCP tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeepSearchResult {
    /// Answer to the query, with inline citations
    pub answer: String,

    /// Sources cited in the answer
    pub sources: Vec<SourceSegment>,
}

impl DeepSearchResult {
    /// Create a result without sources
    pub fn answer_only(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
        }
    }

    /// Build the tool result from a finished research state
    pub fn from_state(state: ResearchState) -> Self {
        let answer = state
            .final_answer()
            .map(str::to_string)
            .unwrap_or_else(|| NO_ANSWER.to_string());

        Self {
            answer,
            sources: state.sources_gathered,
        }
    }
}
