//! Gemini REST API client.
//!
//! Calls `POST {base_url}/models/{model}:generateContent` with the API key in
//! the `x-goog-api-key` header. Structured output uses `responseSchema`, and
//! web research enables the `googleSearch` tool, whose grounding metadata is
//! passed back to the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{GenerateRequest, GenerateResponse, GroundingMetadata, LanguageModel, LlmError};
use crate::config::Config;
use crate::utils::{with_retry, HttpClient, RetryConfig};

/// Default Generative Language API base URL
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini API client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: HttpClient,
    api_key: Option<String>,
    base_url: String,
    retry: RetryConfig,
}

impl GeminiClient {
    /// Create a client with default settings
    ///
    /// A missing key is only reported when a request is made.
    pub fn new(api_key: Option<String>) -> Result<Self, LlmError> {
        Self::with_timeout(api_key, Duration::from_secs(120))
    }

    fn with_timeout(api_key: Option<String>, timeout: Duration) -> Result<Self, LlmError> {
        let http = HttpClient::new(timeout)?;
        Ok(Self {
            http,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: GEMINI_API_BASE.to_string(),
            retry: RetryConfig::default().max_retries(2),
        })
    }

    /// Create a client from the application configuration
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        validate_base_url(&config.gemini.base_url)?;

        let client = Self::with_timeout(
            config.api_keys.gemini.clone(),
            Duration::from_secs(config.gemini.timeout_seconds),
        )?
        .with_base_url(&config.gemini.base_url)
        .with_retry(RetryConfig::default().max_retries(config.gemini.max_retries));

        Ok(client)
    }

    /// Use a different API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a different retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Whether an API key is configured
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    async fn generate_once(
        &self,
        api_key: &str,
        url: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateResponse, LlmError> {
        let response = self
            .http
            .client()
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, retry_after, &text));
        }

        let payload: GenerateContentResponse = response.json().await?;
        payload.into_response()
    }
}

/// Reject base URLs that are not absolute http(s) URLs
fn validate_base_url(base_url: &str) -> Result<(), LlmError> {
    let parsed = url::Url::parse(base_url).map_err(|e| {
        LlmError::InvalidRequest(format!("invalid Gemini base URL {:?}: {}", base_url, e))
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(LlmError::InvalidRequest(format!(
            "unsupported Gemini base URL scheme: {}",
            scheme
        ))),
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;
        if request.model.trim().is_empty() {
            return Err(LlmError::InvalidRequest("model name is empty".to_string()));
        }

        let url = self.endpoint(&request.model);
        let body = GenerateContentRequest::from_request(request);

        tracing::debug!(
            "Gemini request: model={}, structured={}, google_search={}",
            request.model,
            request.response_schema.is_some(),
            request.google_search
        );

        with_retry(self.retry, || self.generate_once(api_key, &url, &body)).await
    }
}

/// Map a non-success HTTP status to an error
fn status_error(status: StatusCode, retry_after: Option<u64>, body: &str) -> LlmError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return LlmError::RateLimit(retry_after);
    }

    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .ok()
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| {
            let body = body.trim();
            if body.is_empty() {
                status.to_string()
            } else {
                body.to_string()
            }
        });

    LlmError::Api {
        status: status.as_u16(),
        message,
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
}

impl GenerateContentRequest {
    fn from_request(request: &GenerateRequest) -> Self {
        let structured = request.response_schema.is_some();
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(request.prompt.clone()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                response_mime_type: structured.then(|| "application/json".to_string()),
                response_schema: request.response_schema.clone(),
            },
            tools: if request.google_search {
                vec![serde_json::json!({ "googleSearch": {} })]
            } else {
                Vec::new()
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn into_response(self) -> Result<GenerateResponse, LlmError> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
                return Err(LlmError::Api {
                    status: 400,
                    message: format!("Prompt blocked: {}", reason),
                });
            }
            return Err(LlmError::EmptyResponse);
        };

        let text: String = candidate
            .content
            .unwrap_or_default()
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if text.is_empty() && candidate.grounding_metadata.is_none() {
            tracing::warn!(
                "Gemini returned no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            );
        }

        Ok(GenerateResponse {
            text,
            grounding: candidate.grounding_metadata,
        })
    }
}
