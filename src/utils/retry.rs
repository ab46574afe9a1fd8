//! Retry utilities with exponential backoff for Gemini API calls.

use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::llm::LlmError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum total time to spend on retries (including delays)
    pub max_total_time: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            max_total_time: Duration::from_secs(300),
        }
    }
}

impl RetryConfig {
    /// Allow `retries` retries after the first attempt
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_attempts = retries + 1;
        self
    }
}

/// Transient errors that should trigger a retry
#[derive(Debug, Clone, PartialEq)]
pub enum TransientError {
    /// Network connectivity issues
    Network,
    /// Rate limit exceeded (with optional retry-after seconds)
    RateLimit(Option<u64>),
    /// Server error (5xx)
    ServerError,
    /// Service unavailable (503)
    ServiceUnavailable,
    /// Request timeout
    Timeout,
}

impl TransientError {
    /// Classify a model error, returning `None` for permanent failures
    pub fn from_llm_error(err: &LlmError) -> Option<Self> {
        match err {
            LlmError::RateLimit(retry_after) => Some(TransientError::RateLimit(*retry_after)),
            LlmError::Network(msg) => {
                if msg.to_lowercase().contains("timed out") {
                    Some(TransientError::Timeout)
                } else {
                    Some(TransientError::Network)
                }
            }
            LlmError::Api { status: 503, .. } => Some(TransientError::ServiceUnavailable),
            LlmError::Api { status, .. } if *status >= 500 => Some(TransientError::ServerError),
            _ => None,
        }
    }

    /// Get the recommended delay for this error
    pub fn recommended_delay(&self) -> Duration {
        match self {
            TransientError::RateLimit(Some(seconds)) => Duration::from_secs(*seconds + 1),
            TransientError::RateLimit(None) => Duration::from_secs(5),
            TransientError::ServiceUnavailable => Duration::from_secs(5),
            TransientError::Timeout => Duration::from_secs(2),
            TransientError::Network => Duration::from_secs(2),
            TransientError::ServerError => Duration::from_secs(2),
        }
    }
}

/// Execute an async operation with retry logic
///
/// Transient errors are retried with exponential backoff, never waiting less
/// than the error's recommended delay. Permanent errors are returned at once.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, operation: F) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, LlmError>>,
{
    let mut attempts = 0;
    let mut total_elapsed = Duration::ZERO;
    let mut operation = operation;

    loop {
        attempts += 1;

        let error = match timeout(config.max_total_time, operation()).await {
            Ok(Ok(result)) => {
                if attempts > 1 {
                    tracing::info!(
                        "Operation succeeded on attempt {} after {} transient failures",
                        attempts,
                        attempts - 1
                    );
                }
                return Ok(result);
            }
            Ok(Err(error)) => error,
            Err(_) => LlmError::Network("Operation timed out".to_string()),
        };

        let Some(transient) = TransientError::from_llm_error(&error) else {
            return Err(error);
        };

        let backoff = if attempts == 1 {
            config.initial_delay
        } else {
            let exp_delay = config.initial_delay.as_secs_f64()
                * config.backoff_multiplier.powf(attempts as f64 - 1.0);
            Duration::from_secs_f64(exp_delay.min(config.max_delay.as_secs_f64()))
        };
        let delay = std::cmp::max(backoff, transient.recommended_delay());

        total_elapsed += delay;

        if attempts >= config.max_attempts || total_elapsed >= config.max_total_time {
            tracing::warn!(
                "Operation failed after {} attempts (total elapsed: {:?}): {}",
                attempts,
                total_elapsed,
                error
            );
            return Err(error);
        }

        tracing::debug!(
            "Transient error on attempt {}: {:?}, retrying in {:?}",
            attempts,
            transient,
            delay
        );

        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_total_time: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn test_retry_success_first_try() {
        let call_count = Rc::new(RefCell::new(0));

        let result = {
            let call_count = call_count.clone();
            with_retry(RetryConfig::default(), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Ok("success")
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(*call_count.borrow(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_after_failures() {
        let call_count = Rc::new(RefCell::new(0));

        let result = {
            let call_count = call_count.clone();
            with_retry(fast_config(4), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    let count = *call_count.borrow();
                    if count < 3 {
                        Err(LlmError::Api {
                            status: 500,
                            message: "internal".to_string(),
                        })
                    } else {
                        Ok("success")
                    }
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(*call_count.borrow(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_attempts() {
        let call_count = Rc::new(RefCell::new(0));

        let result: Result<(), LlmError> = {
            let call_count = call_count.clone();
            with_retry(fast_config(3), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(LlmError::RateLimit(Some(1)))
                }
            })
        }
        .await;

        assert!(matches!(result, Err(LlmError::RateLimit(Some(1)))));
        assert_eq!(*call_count.borrow(), 3);
    }

    #[tokio::test]
    async fn test_retry_returns_permanent_error() {
        let call_count = Rc::new(RefCell::new(0));

        let result: Result<&str, LlmError> = {
            let call_count = call_count.clone();
            with_retry(fast_config(5), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(LlmError::Api {
                        status: 400,
                        message: "API key not valid".to_string(),
                    })
                }
            })
        }
        .await;

        assert!(matches!(result, Err(LlmError::Api { status: 400, .. })));
        // Permanent errors are not retried
        assert_eq!(*call_count.borrow(), 1);
    }

    #[test]
    fn test_transient_error_detection() {
        assert_eq!(
            TransientError::from_llm_error(&LlmError::RateLimit(None)),
            Some(TransientError::RateLimit(None))
        );
        assert_eq!(
            TransientError::from_llm_error(&LlmError::Network("connection refused".to_string())),
            Some(TransientError::Network)
        );
        assert_eq!(
            TransientError::from_llm_error(&LlmError::Network("operation timed out".to_string())),
            Some(TransientError::Timeout)
        );
        assert_eq!(
            TransientError::from_llm_error(&LlmError::Api {
                status: 503,
                message: "overloaded".to_string()
            }),
            Some(TransientError::ServiceUnavailable)
        );

        assert!(TransientError::from_llm_error(&LlmError::Parse("bad".to_string())).is_none());
        assert!(TransientError::from_llm_error(&LlmError::MissingApiKey).is_none());
    }

    #[test]
    fn test_recommended_delay() {
        assert_eq!(
            TransientError::RateLimit(Some(30)).recommended_delay(),
            Duration::from_secs(31)
        );
        assert_eq!(
            TransientError::RateLimit(None).recommended_delay(),
            Duration::from_secs(5)
        );
        assert_eq!(
            TransientError::Network.recommended_delay(),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_max_retries() {
        assert_eq!(RetryConfig::default().max_retries(2).max_attempts, 3);
        assert_eq!(RetryConfig::default().max_retries(0).max_attempts, 1);
    }
}
