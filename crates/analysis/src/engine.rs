//! Single-shot analysis: compose, call the backend, correct if needed.

use crate::composer::PromptComposer;
use crate::corrective::CorrectiveRetryPolicy;
use planlens_core::backend::GenerativeBackend;
use planlens_core::error::Result;
use planlens_core::request::AnalysisRequest;
use std::sync::Arc;
use tracing::info;

/// Runs selected and renovation analyses. Persists nothing.
pub struct AnalysisEngine {
    composer: PromptComposer,
    policy: Arc<CorrectiveRetryPolicy>,
    backend: Arc<dyn GenerativeBackend>,
    default_scope: Option<String>,
}

impl AnalysisEngine {
    pub fn new(
        composer: PromptComposer,
        policy: Arc<CorrectiveRetryPolicy>,
        backend: Arc<dyn GenerativeBackend>,
    ) -> Self {
        Self {
            composer,
            policy,
            backend,
            default_scope: None,
        }
    }

    /// Scope used when a request does not name one.
    pub fn with_default_scope(mut self, scope: Option<String>) -> Self {
        self.default_scope = scope;
        self
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<String> {
        self.analyze_with_persona(request, None).await
    }

    /// Like [`analyze`](Self::analyze), with a caller-supplied persona.
    pub async fn analyze_with_persona(
        &self,
        request: &AnalysisRequest,
        persona: Option<&str>,
    ) -> Result<String> {
        request.validate()?;

        let scope = request
            .user_type_scope
            .as_deref()
            .or(self.default_scope.as_deref());
        let prompt = self
            .composer
            .compose_request(request, persona, self.default_scope.as_deref())
            .await?;

        info!(
            analysis_type = request.analysis_type.as_str(),
            keys = request.prompt_keys.len(),
            documents = request.document_refs.len(),
            "Running analysis"
        );
        let raw = self
            .backend
            .perform_multimodal_analysis(&request.document_refs, &prompt)
            .await?;

        let outcome = self
            .policy
            .apply_if_needed(&request.document_refs, &prompt, scope, raw)
            .await?;
        Ok(outcome.into_text())
    }
}
