//! ConversationLedger trait: persistence contract for conversation threads.
//!
//! The analysis core never keeps private copies of conversations or messages
//! across calls; everything goes through this trait.
//!
//! Implementations: SQLite, in-memory (for testing and ephemeral runs).

use async_trait::async_trait;
use crate::error::PersistenceError;
use crate::message::{Conversation, ConversationId, Message};

/// The core ConversationLedger trait.
#[async_trait]
pub trait ConversationLedger: Send + Sync {
    /// The ledger name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Create a conversation and return its ledger-assigned ID.
    async fn create_conversation(
        &self,
        user_id: &str,
        title: &str,
        prompt_keys: &[String],
    ) -> Result<ConversationId, PersistenceError>;

    /// Fetch a conversation record.
    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, PersistenceError>;

    /// Append a message to its conversation.
    async fn add_message(&self, message: Message) -> Result<(), PersistenceError>;

    /// Messages in timestamp order. Summarized messages are skipped unless asked for.
    async fn get_messages(
        &self,
        id: &ConversationId,
        include_summarized: bool,
    ) -> Result<Vec<Message>, PersistenceError>;

    /// Replace the rolling summary.
    async fn update_summary(
        &self,
        id: &ConversationId,
        summary: &str,
    ) -> Result<(), PersistenceError>;

    /// Flag messages as folded into the summary.
    async fn mark_summarized(
        &self,
        id: &ConversationId,
        message_ids: &[String],
    ) -> Result<(), PersistenceError>;

    async fn update_title(&self, id: &ConversationId, title: &str)
        -> Result<(), PersistenceError>;

    /// Record how a thread was seeded: its system instruction, the opening
    /// prompt as sent to the model, and the attached documents.
    async fn set_context(
        &self,
        id: &ConversationId,
        system_prompt: &str,
        opening_prompt: Option<&str>,
        document_refs: &[String],
    ) -> Result<(), PersistenceError>;

    /// Conversations owned by a user, most recently updated first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Conversation>, PersistenceError>;
}
