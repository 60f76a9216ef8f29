//! Prompt composition: persona plus task fragments, per analysis type.

use crate::catalog;
use planlens_core::error::{Error, Result};
use planlens_core::request::{AnalysisRequest, AnalysisType, validate_prompt_keys};
use planlens_prompts::PromptStore;
use tracing::debug;

/// Separator placed between task fragments of a multi-key selected analysis.
pub const FRAGMENT_SEPARATOR: &str = "\n\n---\n\n";

/// Heading under which free user text is appended to a composed prompt.
pub const USER_CONTEXT_HEADING: &str = "\n\n**Additional Context from User:**\n";

/// Builds the final prompt text for a single-shot analysis.
#[derive(Clone)]
pub struct PromptComposer {
    store: PromptStore,
}

impl PromptComposer {
    pub fn new(store: PromptStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PromptStore {
        &self.store
    }

    /// Compose the prompt for `prompt_keys`.
    ///
    /// `persona` replaces the stored selected-analysis persona when given.
    /// Key validation runs before any fragment is fetched.
    pub async fn compose(
        &self,
        analysis_type: AnalysisType,
        persona: Option<&str>,
        prompt_keys: &[String],
        scope: Option<&str>,
    ) -> Result<String> {
        validate_prompt_keys(analysis_type, prompt_keys)?;

        match analysis_type {
            AnalysisType::Selected => {
                let persona = match persona {
                    Some(p) => p.to_string(),
                    None => self.store.get(scope, catalog::SELECTED_PERSONA).await?.to_string(),
                };

                let mut subs = Vec::with_capacity(prompt_keys.len());
                for key in prompt_keys {
                    subs.push(self.store.get(scope, key).await?);
                }
                let body = subs
                    .iter()
                    .map(|s| s.as_ref())
                    .collect::<Vec<&str>>()
                    .join(FRAGMENT_SEPARATOR);

                debug!(keys = prompt_keys.len(), "Composed selected analysis prompt");
                Ok(format!("{persona}\n\n{body}"))
            }
            AnalysisType::Renovation => {
                let text = self.store.get(scope, &prompt_keys[0]).await?;
                Ok(text.to_string())
            }
            AnalysisType::Comprehensive => Err(Error::Validation(
                "comprehensive analysis runs through the sequential pipeline".into(),
            )),
        }
    }

    /// Compose a whole request, appending the user's context text if present.
    pub async fn compose_request(
        &self,
        request: &AnalysisRequest,
        persona: Option<&str>,
        default_scope: Option<&str>,
    ) -> Result<String> {
        let scope = request.user_type_scope.as_deref().or(default_scope);
        let mut prompt = self
            .compose(request.analysis_type, persona, &request.prompt_keys, scope)
            .await?;

        if let Some(context) = request.user_context.as_deref().filter(|c| !c.trim().is_empty()) {
            prompt.push_str(USER_CONTEXT_HEADING);
            prompt.push_str(context);
        }
        Ok(prompt)
    }
}
