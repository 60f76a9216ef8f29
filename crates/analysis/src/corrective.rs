//! Failure-sentinel detection and the single corrective re-prompt.

use crate::catalog;
use planlens_core::backend::GenerativeBackend;
use planlens_core::error::Result;
use planlens_prompts::PromptStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Inputs of one corrective attempt. Never persisted.
#[derive(Debug, Clone, Copy)]
pub struct CorrectiveContext<'a> {
    pub original_response: &'a str,
    pub corrective_prompt: &'a str,
}

impl CorrectiveContext<'_> {
    /// The text sent to the backend for the corrective attempt.
    pub fn input(&self) -> String {
        format!(
            "{}\n\nOriginal Failed Response:\n{}",
            self.corrective_prompt, self.original_response
        )
    }
}

/// What the policy did with a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrectionOutcome {
    /// No sentinel; the response is used as-is.
    Passed(String),
    /// A sentinel fired and the corrective attempt's result replaces the original.
    Corrected { original: String, corrected: String },
}

impl CorrectionOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Passed(text) => text,
            Self::Corrected { corrected, .. } => corrected,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Passed(text) => text,
            Self::Corrected { corrected, .. } => corrected,
        }
    }

    pub fn was_corrected(&self) -> bool {
        matches!(self, Self::Corrected { .. })
    }
}

/// Detects failure sentinels and drives at most one corrective attempt.
pub struct CorrectiveRetryPolicy {
    store: PromptStore,
    backend: Arc<dyn GenerativeBackend>,
    /// Lowercased markers
    sentinels: Vec<String>,
}

impl CorrectiveRetryPolicy {
    pub fn new(store: PromptStore, backend: Arc<dyn GenerativeBackend>) -> Self {
        Self {
            store,
            backend,
            sentinels: Vec::new(),
        }
        .with_sentinels(planlens_config::default_failure_sentinels())
    }

    /// Replace the sentinel list. Blank markers are ignored.
    pub fn with_sentinels<I, S>(mut self, sentinels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.sentinels = sentinels
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    /// The first configured marker found in `response`, case-insensitively.
    pub fn matched_sentinel(&self, response: &str) -> Option<&str> {
        let haystack = response.to_lowercase();
        self.sentinels
            .iter()
            .find(|s| haystack.contains(s.as_str()))
            .map(String::as_str)
    }

    pub fn is_failure(&self, response: &str) -> bool {
        self.matched_sentinel(response).is_some()
    }

    /// Pass `response` through, or replace it with one corrective attempt
    /// against the same documents when it carries a failure sentinel.
    ///
    /// The corrective result is returned whatever it contains.
    pub async fn apply_if_needed(
        &self,
        document_refs: &[String],
        original_prompt: &str,
        scope: Option<&str>,
        response: String,
    ) -> Result<CorrectionOutcome> {
        let Some(sentinel) = self.matched_sentinel(&response) else {
            return Ok(CorrectionOutcome::Passed(response));
        };

        warn!(
            sentinel,
            prompt_len = original_prompt.len(),
            documents = document_refs.len(),
            "Failure sentinel in response, sending corrective prompt"
        );

        let corrective = self.store.get(scope, catalog::FAILURE_CORRECTIVE).await?;
        let context = CorrectiveContext {
            original_response: &response,
            corrective_prompt: &corrective,
        };
        let corrected = self
            .backend
            .perform_multimodal_analysis(document_refs, &context.input())
            .await?;

        if self.is_failure(&corrected) {
            debug!("Corrective response still carries a sentinel; returning it unchanged");
        }

        Ok(CorrectionOutcome::Corrected {
            original: response,
            corrected,
        })
    }
}
