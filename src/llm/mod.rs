//! Language model access for the research agent.
//!
//! This module defines the [`LanguageModel`] trait the agent talks to. The
//! production implementation is [`GeminiClient`], which calls the Gemini REST
//! API; [`MockModel`] is a scripted stand-in for tests.
//!
//! A single request type covers the three kinds of calls the agent makes:
//!
//! - plain text generation (the final answer),
//! - structured JSON generation with a response schema (queries, reflection),
//! - generation grounded by Google Search (web research), which also returns
//!   [`GroundingMetadata`] describing the sources behind the text.

mod gemini;
pub mod mock;

pub use gemini::{GeminiClient, GEMINI_API_BASE};
pub use mock::{MockModel, RequestKind};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A generation request sent to a language model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    /// Model name (e.g. "gemini-2.5-flash-preview-05-20")
    pub model: String,

    /// Prompt sent as a single user turn
    pub prompt: String,

    /// Sampling temperature
    pub temperature: f32,

    /// JSON schema the response must follow, for structured output
    pub response_schema: Option<Value>,

    /// Whether to ground the response with Google Search
    pub google_search: bool,
}

impl GenerateRequest {
    /// Create a new request with temperature 0
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature: 0.0,
            response_schema: None,
            google_search: false,
        }
    }

    /// Set the sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Request JSON output matching the given schema
    pub fn json_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    /// Ground the response with Google Search
    pub fn google_search(mut self) -> Self {
        self.google_search = true;
        self
    }
}

/// A model response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    /// Generated text
    pub text: String,

    /// Grounding information, present for search-grounded requests
    pub grounding: Option<GroundingMetadata>,
}

impl GenerateResponse {
    /// A response carrying only text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            grounding: None,
        }
    }

    /// A response carrying text and grounding metadata
    pub fn grounded(text: impl Into<String>, grounding: GroundingMetadata) -> Self {
        Self {
            text: text.into(),
            grounding: Some(grounding),
        }
    }
}

/// Sources and supported spans returned with a grounded response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,

    #[serde(default)]
    pub grounding_supports: Vec<GroundingSupport>,

    #[serde(default)]
    pub web_search_queries: Vec<String>,
}

/// A source consulted by the search tool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebChunk>,
}

impl GroundingChunk {
    /// Create a web chunk
    pub fn web(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            web: Some(WebChunk {
                uri: uri.into(),
                title: title.into(),
            }),
        }
    }
}

/// Web page behind a grounding chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebChunk {
    #[serde(default)]
    pub uri: String,

    #[serde(default)]
    pub title: String,
}

/// A span of the response text backed by grounding chunks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingSupport {
    #[serde(default)]
    pub segment: Option<Segment>,

    #[serde(default)]
    pub grounding_chunk_indices: Vec<usize>,

    #[serde(default)]
    pub confidence_scores: Vec<f64>,
}

impl GroundingSupport {
    /// Create a support for the span `start..end` backed by the given chunks
    pub fn new(start_index: usize, end_index: usize, chunk_indices: Vec<usize>) -> Self {
        Self {
            segment: Some(Segment {
                start_index: Some(start_index),
                end_index: Some(end_index),
                text: String::new(),
            }),
            grounding_chunk_indices: chunk_indices,
            confidence_scores: Vec::new(),
        }
    }
}

/// Byte range of the response text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    #[serde(default)]
    pub start_index: Option<usize>,

    #[serde(default)]
    pub end_index: Option<usize>,

    #[serde(default)]
    pub text: String,
}

/// Interface to a generative language model
#[async_trait]
pub trait LanguageModel: Send + Sync + std::fmt::Debug {
    /// Generate a response for the request
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, LlmError>;
}

/// Generate a structured response and deserialize it
///
/// Models sometimes wrap JSON output in a fenced code block even when a
/// response schema is set, so fences are stripped before parsing.
pub async fn generate_structured<T: DeserializeOwned>(
    model: &dyn LanguageModel,
    request: &GenerateRequest,
) -> Result<T, LlmError> {
    let response = model.generate(request).await?;
    let body = strip_code_fence(&response.text);
    if body.is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    serde_json::from_str(body).map_err(|e| {
        LlmError::Parse(format!(
            "Failed to parse structured output from {}: {}",
            request.model, e
        ))
    })
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string ("json") on the opening fence line
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };

    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Errors that can occur when calling a language model
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// No API key was configured
    #[error("Gemini API key is not configured (set GEMINI_API_KEY)")]
    MissingApiKey,

    /// The API rejected the request
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded (with optional retry-after seconds)
    #[error("Rate limit exceeded")]
    RateLimit(Option<u64>),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// The response could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// The model returned no usable content
    #[error("Model returned an empty response")]
    EmptyResponse,

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl LlmError {
    /// Whether the error was reported by the Google API itself
    pub fn is_google_api_error(&self) -> bool {
        matches!(self, LlmError::Api { .. } | LlmError::RateLimit(_))
    }

    /// Human-readable message without the variant prefix
    pub fn message(&self) -> String {
        match self {
            LlmError::Api { message, .. } => message.clone(),
            LlmError::Network(msg) | LlmError::Parse(msg) | LlmError::InvalidRequest(msg) => {
                msg.clone()
            }
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Parse(format!("JSON: {}", err))
    }
}
