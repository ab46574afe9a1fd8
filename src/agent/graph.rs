//! The research agent graph.
//!
//! ```text
//! generate_query -> web_research (fan-out) -> reflection -> evaluate_research
//!                        ^                                      |
//!                        +------------- follow-up queries ------+
//!                                                               |
//!                                                        finalize_answer
//! ```

use std::sync::Arc;

use futures_util::future::try_join_all;
use serde_json::{json, Value};

use super::citations::{
    gathered_sources, get_citations, get_research_topic, insert_citation_markers,
    replace_short_urls, resolve_urls,
};
use super::configuration::AgentConfiguration;
use super::prompts::{
    answer_instructions, get_current_date, query_writer_instructions, reflection_instructions,
    web_searcher_instructions,
};
use crate::llm::{generate_structured, GenerateRequest, LanguageModel, LlmError};
use crate::models::{
    get_effort_settings, DeepSearchResult, Effort, Message, Reflection, ResearchState,
    SearchQueryList, SourceSegment,
};

/// Answer returned when the Gemini API reports an error
pub fn google_api_error_answer(message: &str) -> String {
    format!(
        "A Google API error occurred: {}. Please check logs for details.",
        message
    )
}

/// Answer returned for any other failure
pub const UNEXPECTED_ERROR_ANSWER: &str =
    "An unexpected error occurred during the search process. Please check logs for details.";

/// Map an agent failure to the result returned to the client, logging it
pub fn error_result(err: &LlmError) -> DeepSearchResult {
    if err.is_google_api_error() {
        tracing::error!("Google API error during deep search: {}", err);
        DeepSearchResult::answer_only(google_api_error_answer(&err.message()))
    } else {
        tracing::error!("Unexpected error during deep search: {}", err);
        DeepSearchResult::answer_only(UNEXPECTED_ERROR_ANSWER)
    }
}

/// One web research call to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSearchTask {
    /// The query to research
    pub search_query: String,

    /// Id used to build short URLs, unique within a run
    pub id: usize,
}

/// Output of one web research call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebResearchOutput {
    /// The query that was researched
    pub search_query: String,

    /// Summary with inline citation markers
    pub web_research_result: String,

    /// Sources cited in the summary
    pub sources_gathered: Vec<SourceSegment>,
}

/// What the graph does after a reflection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    /// Research the follow-up queries
    Research(Vec<WebSearchTask>),

    /// Write the final answer
    Finalize,
}

/// Multi-step web research agent
#[derive(Debug, Clone)]
pub struct ResearchAgent {
    model: Arc<dyn LanguageModel>,
    config: AgentConfiguration,
}

impl ResearchAgent {
    /// Create an agent backed by `model`
    pub fn new(model: Arc<dyn LanguageModel>, config: AgentConfiguration) -> Self {
        Self { model, config }
    }

    /// The agent configuration
    pub fn config(&self) -> &AgentConfiguration {
        &self.config
    }

    /// Run a deep search and map the outcome to a tool result
    ///
    /// Failures never escape: Google API errors and other errors become an
    /// explanatory answer with no sources.
    pub async fn deep_search(&self, query: &str, effort: Effort) -> DeepSearchResult {
        match self.research(query, effort).await {
            Ok(result) => result,
            Err(e) => error_result(&e),
        }
    }

    /// Run a deep search, returning agent failures as errors
    pub async fn research(&self, query: &str, effort: Effort) -> Result<DeepSearchResult, LlmError> {
        let settings = get_effort_settings(effort);
        let state = ResearchState::from_query(query, &settings);

        tracing::info!(
            "Starting deep search (effort: {}, queries: {}, loops: {})",
            effort,
            settings.initial_search_query_count,
            settings.max_research_loops
        );

        let result = DeepSearchResult::from_state(self.run(state).await?);
        tracing::info!("Deep search finished with {} sources", result.sources.len());
        Ok(result)
    }

    /// Drive the graph from `state` to a final answer
    pub async fn run(&self, mut state: ResearchState) -> Result<ResearchState, LlmError> {
        let queries = self.generate_query(&state).await?;
        let mut tasks: Vec<WebSearchTask> = queries
            .into_iter()
            .enumerate()
            .map(|(id, search_query)| WebSearchTask { search_query, id })
            .collect();

        loop {
            let outputs = self.research_all(&tasks).await?;
            for output in outputs {
                state.search_query.push(output.search_query);
                state.web_research_result.push(output.web_research_result);
                state.sources_gathered.extend(output.sources_gathered);
            }

            self.reflection(&mut state).await?;

            match self.evaluate_research(&state) {
                NextStep::Research(next) => tasks = next,
                NextStep::Finalize => break,
            }
        }

        self.finalize_answer(&mut state).await?;
        Ok(state)
    }

    /// Generate the first round of search queries
    ///
    /// Falls back to the research topic itself when the model proposes none.
    pub async fn generate_query(&self, state: &ResearchState) -> Result<Vec<String>, LlmError> {
        let number_queries = state
            .initial_search_query_count
            .unwrap_or(self.config.number_of_initial_queries);
        let research_topic = get_research_topic(&state.messages);

        let prompt = query_writer_instructions(&get_current_date(), &research_topic, number_queries);
        let request = GenerateRequest::new(&self.config.query_generator_model, prompt)
            .temperature(1.0)
            .json_schema(search_query_list_schema());

        let result: SearchQueryList = generate_structured(self.model.as_ref(), &request).await?;

        let mut queries: Vec<String> = result
            .query
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();

        if queries.is_empty() {
            tracing::warn!("Query generation returned no queries, searching the topic directly");
            queries.push(research_topic);
        }

        tracing::debug!("Generated {} search queries: {:?}", queries.len(), queries);
        Ok(queries)
    }

    /// Run all tasks concurrently, returning outputs in task order
    async fn research_all(&self, tasks: &[WebSearchTask]) -> Result<Vec<WebResearchOutput>, LlmError> {
        try_join_all(tasks.iter().map(|task| self.web_research(task))).await
    }

    /// Research one query with Google Search grounding
    pub async fn web_research(&self, task: &WebSearchTask) -> Result<WebResearchOutput, LlmError> {
        tracing::debug!("Web research #{}: {}", task.id, task.search_query);

        let prompt = web_searcher_instructions(&get_current_date(), &task.search_query);
        let request = GenerateRequest::new(&self.config.query_generator_model, prompt)
            .temperature(0.0)
            .google_search();

        let response = self.model.generate(&request).await?;

        let chunks = response
            .grounding
            .as_ref()
            .map(|g| g.grounding_chunks.as_slice())
            .unwrap_or_default();
        let resolved_urls = resolve_urls(chunks, task.id);
        let citations = get_citations(response.grounding.as_ref(), &resolved_urls);
        let modified_text = insert_citation_markers(&response.text, &citations);

        Ok(WebResearchOutput {
            search_query: task.search_query.clone(),
            web_research_result: modified_text,
            sources_gathered: gathered_sources(&citations),
        })
    }

    /// Reflect on the gathered summaries and record the outcome in `state`
    pub async fn reflection(&self, state: &mut ResearchState) -> Result<(), LlmError> {
        state.research_loop_count += 1;
        state.number_of_ran_queries = state.search_query.len();

        let model = state
            .reasoning_model
            .clone()
            .unwrap_or_else(|| self.config.reflection_model.clone());
        let prompt = reflection_instructions(
            &get_current_date(),
            &get_research_topic(&state.messages),
            &state.web_research_result,
        );
        let request = GenerateRequest::new(model, prompt)
            .temperature(1.0)
            .json_schema(reflection_schema());

        let reflection: Reflection = generate_structured(self.model.as_ref(), &request).await?;

        tracing::debug!(
            "Reflection loop {}: sufficient={}, follow-ups={}",
            state.research_loop_count,
            reflection.is_sufficient,
            reflection.follow_up_queries.len()
        );

        state.reflection = Some(reflection);
        Ok(())
    }

    /// Decide whether to keep researching or write the answer
    pub fn evaluate_research(&self, state: &ResearchState) -> NextStep {
        let max_research_loops = state
            .max_research_loops
            .unwrap_or(self.config.max_research_loops);

        let Some(reflection) = &state.reflection else {
            return NextStep::Finalize;
        };

        if reflection.is_sufficient || state.research_loop_count >= max_research_loops {
            return NextStep::Finalize;
        }

        let tasks: Vec<WebSearchTask> = reflection
            .follow_up_queries
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .enumerate()
            .map(|(idx, q)| WebSearchTask {
                search_query: q.to_string(),
                id: state.number_of_ran_queries + idx,
            })
            .collect();

        if tasks.is_empty() {
            tracing::debug!("Reflection proposed no follow-up queries, finalizing");
            NextStep::Finalize
        } else {
            NextStep::Research(tasks)
        }
    }

    /// Write the final answer and keep only the sources it cites
    pub async fn finalize_answer(&self, state: &mut ResearchState) -> Result<(), LlmError> {
        let model = state
            .reasoning_model
            .clone()
            .unwrap_or_else(|| self.config.answer_model.clone());
        let prompt = answer_instructions(
            &get_current_date(),
            &get_research_topic(&state.messages),
            &state.web_research_result,
        );
        let request = GenerateRequest::new(model, prompt).temperature(0.0);

        let response = self.model.generate(&request).await?;
        let (answer, unique_sources) = replace_short_urls(&response.text, &state.sources_gathered);

        state.messages.push(Message::assistant(answer));
        state.sources_gathered = unique_sources;
        Ok(())
    }
}

/// Response schema for query generation
fn search_query_list_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "query": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "A list of search queries to be used for web research."
            },
            "rationale": {
                "type": "STRING",
                "description": "A brief explanation of why these queries are relevant to the research topic."
            }
        },
        "required": ["query", "rationale"]
    })
}

/// Response schema for reflection
fn reflection_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "is_sufficient": {
                "type": "BOOLEAN",
                "description": "Whether the provided summaries are sufficient to answer the user's question."
            },
            "knowledge_gap": {
                "type": "STRING",
                "description": "A description of what information is missing or needs clarification."
            },
            "follow_up_queries": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "A list of follow-up queries to address the knowledge gap."
            }
        },
        "required": ["is_sufficient", "knowledge_gap", "follow_up_queries"]
    })
}
