//! In-memory ledger: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use planlens_core::error::PersistenceError;
use planlens_core::ledger::ConversationLedger;
use planlens_core::message::{Conversation, ConversationId, Message};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    conversations: HashMap<ConversationId, Conversation>,
    /// Insertion order is preserved; reads sort stably by timestamp.
    messages: HashMap<ConversationId, Vec<Message>>,
}

/// A ledger that keeps everything in process memory.
pub struct InMemoryLedger {
    state: Arc<RwLock<State>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
        }
    }

    /// Total messages across every conversation.
    pub async fn message_count(&self) -> usize {
        self.state.read().await.messages.values().map(Vec::len).sum()
    }

    pub async fn conversation_count(&self) -> usize {
        self.state.read().await.conversations.len()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(id: &ConversationId) -> PersistenceError {
    PersistenceError::ConversationNotFound(id.clone())
}

#[async_trait]
impl ConversationLedger for InMemoryLedger {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create_conversation(
        &self,
        user_id: &str,
        title: &str,
        prompt_keys: &[String],
    ) -> Result<ConversationId, PersistenceError> {
        let conversation = Conversation::new(user_id, title, prompt_keys.to_vec());
        let id = conversation.id.clone();
        let mut state = self.state.write().await;
        state.messages.insert(id.clone(), Vec::new());
        state.conversations.insert(id.clone(), conversation);
        Ok(id)
    }

    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, PersistenceError> {
        Ok(self.state.read().await.conversations.get(id).cloned())
    }

    async fn add_message(&self, message: Message) -> Result<(), PersistenceError> {
        let mut state = self.state.write().await;
        let id = message.conversation_id.clone();
        let conversation = state.conversations.get_mut(&id).ok_or_else(|| not_found(&id))?;
        conversation.updated_at = Utc::now();
        state.messages.entry(id).or_default().push(message);
        Ok(())
    }

    async fn get_messages(
        &self,
        id: &ConversationId,
        include_summarized: bool,
    ) -> Result<Vec<Message>, PersistenceError> {
        let state = self.state.read().await;
        let mut messages: Vec<Message> = state
            .messages
            .get(id)
            .map(|m| {
                m.iter()
                    .filter(|m| include_summarized || !m.is_summarized)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    async fn update_summary(
        &self,
        id: &ConversationId,
        summary: &str,
    ) -> Result<(), PersistenceError> {
        let mut state = self.state.write().await;
        let conversation = state.conversations.get_mut(id).ok_or_else(|| not_found(id))?;
        conversation.summary = Some(summary.to_string());
        conversation.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_summarized(
        &self,
        id: &ConversationId,
        message_ids: &[String],
    ) -> Result<(), PersistenceError> {
        let mut state = self.state.write().await;
        let messages = state.messages.get_mut(id).ok_or_else(|| not_found(id))?;
        for message in messages.iter_mut() {
            if message_ids.contains(&message.id) {
                message.is_summarized = true;
            }
        }
        Ok(())
    }

    async fn update_title(
        &self,
        id: &ConversationId,
        title: &str,
    ) -> Result<(), PersistenceError> {
        let mut state = self.state.write().await;
        let conversation = state.conversations.get_mut(id).ok_or_else(|| not_found(id))?;
        conversation.title = title.to_string();
        conversation.updated_at = Utc::now();
        Ok(())
    }

    async fn set_context(
        &self,
        id: &ConversationId,
        system_prompt: &str,
        opening_prompt: Option<&str>,
        document_refs: &[String],
    ) -> Result<(), PersistenceError> {
        let mut state = self.state.write().await;
        let conversation = state.conversations.get_mut(id).ok_or_else(|| not_found(id))?;
        conversation.system_prompt = Some(system_prompt.to_string());
        conversation.opening_prompt = opening_prompt.map(str::to_string);
        conversation.document_refs = document_refs.to_vec();
        conversation.updated_at = Utc::now();
        Ok(())
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Conversation>, PersistenceError> {
        let state = self.state.read().await;
        let mut conversations: Vec<Conversation> = state
            .conversations
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(conversations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract;

    #[tokio::test]
    async fn satisfies_ledger_contract() {
        contract::run_all(&InMemoryLedger::new()).await;
    }

    #[tokio::test]
    async fn counts_track_writes() {
        let ledger = InMemoryLedger::new();
        let id = ledger.create_conversation("u1", "t", &[]).await.unwrap();
        ledger.add_message(Message::user(id.clone(), "hi")).await.unwrap();
        ledger.add_message(Message::model(id, "hello")).await.unwrap();
        assert_eq!(ledger.conversation_count().await, 1);
        assert_eq!(ledger.message_count().await, 2);
    }
}
