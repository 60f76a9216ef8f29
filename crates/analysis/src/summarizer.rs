//! Folds old messages of a long thread into the conversation summary.

use crate::catalog;
use planlens_core::backend::GenerativeBackend;
use planlens_core::error::{PersistenceError, Result};
use planlens_core::ledger::ConversationLedger;
use planlens_core::message::ConversationId;
use planlens_prompts::PromptStore;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::info;

pub struct ConversationSummarizer {
    store: PromptStore,
    backend: Arc<dyn GenerativeBackend>,
    ledger: Arc<dyn ConversationLedger>,
    keep_recent: usize,
    scope: Option<String>,
}

impl ConversationSummarizer {
    pub fn new(
        store: PromptStore,
        backend: Arc<dyn GenerativeBackend>,
        ledger: Arc<dyn ConversationLedger>,
    ) -> Self {
        Self {
            store,
            backend,
            ledger,
            keep_recent: 10,
            scope: None,
        }
    }

    /// Scope for the summary instructions.
    pub fn with_scope(mut self, scope: Option<String>) -> Self {
        self.scope = scope;
        self
    }

    /// Number of newest unsummarized messages left untouched.
    pub fn with_keep_recent(mut self, keep_recent: usize) -> Self {
        self.keep_recent = keep_recent;
        self
    }

    /// Summarize everything but the newest messages.
    ///
    /// Returns the new summary, or `None` when the thread is short enough.
    pub async fn summarize(&self, conversation_id: &ConversationId) -> Result<Option<String>> {
        let conversation = self
            .ledger
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| PersistenceError::ConversationNotFound(conversation_id.clone()))?;

        let messages = self.ledger.get_messages(conversation_id, false).await?;
        if messages.len() <= self.keep_recent {
            return Ok(None);
        }
        let older = &messages[..messages.len() - self.keep_recent];

        let instructions = self.store.get(self.scope.as_deref(), catalog::SUMMARIZE).await?;
        let mut prompt = instructions.to_string();
        if let Some(summary) = conversation.summary.as_deref() {
            let _ = write!(prompt, "\n\n**Existing Summary:**\n{summary}");
        }
        prompt.push_str("\n\n**Conversation:**");
        for message in older {
            let _ = write!(prompt, "\n\n{}: {}", message.role.as_str(), message.content);
        }

        let summary = self.backend.perform_multimodal_analysis(&[], &prompt).await?;
        let ids: Vec<String> = older.iter().map(|m| m.id.clone()).collect();
        self.ledger.update_summary(conversation_id, &summary).await?;
        self.ledger.mark_summarized(conversation_id, &ids).await?;

        info!(conversation_id = %conversation_id, folded = ids.len(), "Conversation summarized");
        Ok(Some(summary))
    }
}
