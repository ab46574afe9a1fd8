//! Mock language model for testing purposes.

use async_trait::async_trait;
use std::sync::Mutex;

use super::{GenerateRequest, GenerateResponse, LanguageModel, LlmError};

type Responder = dyn Fn(&GenerateRequest) -> Result<GenerateResponse, LlmError> + Send + Sync;

/// A mock model that answers every request with a closure and records it.
pub struct MockModel {
    responder: Box<Responder>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockModel {
    /// Create a new mock model driven by `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&GenerateRequest) -> Result<GenerateResponse, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Number of requests of the given kind received so far.
    pub fn count(&self, kind: RequestKind) -> usize {
        self.requests()
            .iter()
            .filter(|r| RequestKind::of(r) == kind)
            .count()
    }
}

impl std::fmt::Debug for MockModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockModel")
            .field("requests", &self.requests().len())
            .finish()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, LlmError> {
        if let Ok(mut guard) = self.requests.lock() {
            guard.push(request.clone());
        }
        (self.responder)(request)
    }
}

/// Which agent step a request comes from, judged by its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    QueryGeneration,
    WebResearch,
    Reflection,
    Answer,
}

impl RequestKind {
    /// Classify a request
    pub fn of(request: &GenerateRequest) -> Self {
        if request.google_search {
            return RequestKind::WebResearch;
        }

        match &request.response_schema {
            Some(schema) if schema["properties"].get("is_sufficient").is_some() => {
                RequestKind::Reflection
            }
            Some(_) => RequestKind::QueryGeneration,
            None => RequestKind::Answer,
        }
    }
}
