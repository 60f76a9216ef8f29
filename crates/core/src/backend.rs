//! GenerativeBackend trait: the abstraction over multi-modal AI providers.
//!
//! A backend can run a one-shot analysis over a set of documents, or hold a
//! conversation that later turns continue. Conversation IDs are opaque: the
//! backend may hand back a different ID than the one it was given, and callers
//! must thread the returned ID into the next turn.
//!
//! Implementations: Gemini `generateContent`, recording doubles in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::BackendError;
use crate::message::ConversationId;

/// A conversational reply from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendReply {
    /// The generated text
    pub text: String,

    /// The conversation the reply belongs to
    pub conversation_id: ConversationId,
}

impl BackendReply {
    pub fn new(text: impl Into<String>, conversation_id: ConversationId) -> Self {
        Self {
            text: text.into(),
            conversation_id,
        }
    }
}

/// The core GenerativeBackend trait.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// A human-readable name for this backend (e.g., "gemini").
    fn name(&self) -> &str;

    /// Start a conversation seeded with documents, a system instruction and a first prompt.
    async fn start_multimodal_conversation(
        &self,
        user_id: &str,
        document_refs: &[String],
        system_prompt: &str,
        initial_prompt: &str,
    ) -> Result<BackendReply, BackendError>;

    /// Send the next turn of an existing conversation.
    async fn continue_conversation(
        &self,
        conversation_id: &ConversationId,
        user_id: &str,
        message: &str,
        prompt_keys: Option<&[String]>,
    ) -> Result<BackendReply, BackendError>;

    /// First turn of a text-only conversation whose ID already exists.
    async fn start_text_conversation(
        &self,
        conversation_id: &ConversationId,
        system_prompt: &str,
        message: &str,
    ) -> Result<BackendReply, BackendError>;

    /// One-shot analysis of documents with a prompt. No conversation state.
    async fn perform_multimodal_analysis(
        &self,
        document_refs: &[String],
        prompt: &str,
    ) -> Result<String, BackendError>;

    /// Health check: can we reach the backend?
    async fn health_check(&self) -> Result<bool, BackendError> {
        Ok(true)
    }
}
