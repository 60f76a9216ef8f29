//! Retrying backend: re-issues calls that failed for transient reasons.
//!
//! Rate limits, network errors and 5xx responses are retried with
//! exponential backoff. Everything else is returned immediately.

use async_trait::async_trait;
use planlens_core::backend::{BackendReply, GenerativeBackend};
use planlens_core::error::BackendError;
use planlens_core::message::ConversationId;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Longest wait between two attempts, for backoff and `retry-after` hints alike.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// A backend that wraps another and retries transient failures.
pub struct RetryingBackend {
    name: String,
    inner: Arc<dyn GenerativeBackend>,
    max_retries: u32,
    base_delay: Duration,
}

impl RetryingBackend {
    pub fn new(inner: Arc<dyn GenerativeBackend>, max_retries: u32) -> Self {
        Self {
            name: format!("{}+retry", inner.name()),
            inner,
            max_retries,
            base_delay: Duration::from_secs(2),
        }
    }

    /// Override the first backoff delay (doubled after each attempt).
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    fn is_transient(error: &BackendError) -> bool {
        match error {
            BackendError::RateLimited { .. } | BackendError::Network(_) => true,
            BackendError::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    fn delay_for(&self, attempt: u32, error: &BackendError) -> Duration {
        match error {
            BackendError::RateLimited { retry_after_secs } => {
                Duration::from_secs(*retry_after_secs).min(MAX_RETRY_DELAY)
            }
            _ => self
                .base_delay
                .saturating_mul(2u32.saturating_pow(attempt))
                .min(MAX_RETRY_DELAY),
        }
    }

    async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries && Self::is_transient(&e) => {
                    let delay = self.delay_for(attempt, &e);
                    warn!(
                        backend = %self.inner.name(),
                        operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient backend failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt > 0 {
                        info!(operation, attempts = attempt + 1, "Giving up after retries");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl GenerativeBackend for RetryingBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start_multimodal_conversation(
        &self,
        user_id: &str,
        document_refs: &[String],
        system_prompt: &str,
        initial_prompt: &str,
    ) -> Result<BackendReply, BackendError> {
        self.run("start_multimodal_conversation", || {
            self.inner
                .start_multimodal_conversation(user_id, document_refs, system_prompt, initial_prompt)
        })
        .await
    }

    async fn continue_conversation(
        &self,
        conversation_id: &ConversationId,
        user_id: &str,
        message: &str,
        prompt_keys: Option<&[String]>,
    ) -> Result<BackendReply, BackendError> {
        self.run("continue_conversation", || {
            self.inner
                .continue_conversation(conversation_id, user_id, message, prompt_keys)
        })
        .await
    }

    async fn start_text_conversation(
        &self,
        conversation_id: &ConversationId,
        system_prompt: &str,
        message: &str,
    ) -> Result<BackendReply, BackendError> {
        self.run("start_text_conversation", || {
            self.inner
                .start_text_conversation(conversation_id, system_prompt, message)
        })
        .await
    }

    async fn perform_multimodal_analysis(
        &self,
        document_refs: &[String],
        prompt: &str,
    ) -> Result<String, BackendError> {
        self.run("perform_multimodal_analysis", || {
            self.inner.perform_multimodal_analysis(document_refs, prompt)
        })
        .await
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        self.inner.health_check().await
    }
}
