//! Utility modules supporting the research agent.
//!
//! - [`HttpClient`]: shared reqwest client with timeouts
//! - [`RetryConfig`] and [`with_retry`]: retry with exponential backoff on
//!   transient Gemini errors (rate limits, 5xx, network)
//! - [`CacheService`]: on-disk cache of deep search results
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use deepsearch_mcp::llm::LlmError;
//! use deepsearch_mcp::utils::{with_retry, RetryConfig};
//!
//! # async fn call_model() -> Result<String, LlmError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), LlmError> {
//! let config = RetryConfig::default().max_retries(3);
//! let text = with_retry(config, || call_model()).await?;
//! # Ok(())
//! # }
//! ```

mod cache;
mod http;
mod retry;

pub use cache::{CacheResult, CacheService, CacheStats};
pub use http::HttpClient;
pub use retry::{with_retry, RetryConfig, TransientError};
