//! Message routing between document analysis and plain conversation.

use crate::catalog;
use crate::engine::AnalysisEngine;
use planlens_core::backend::GenerativeBackend;
use planlens_core::error::{Error, PersistenceError, Result};
use planlens_core::ledger::ConversationLedger;
use planlens_core::message::{Conversation, ConversationId, Message};
use planlens_core::request::{AnalysisRequest, AnalysisType};
use planlens_prompts::PromptStore;
use std::sync::Arc;
use tracing::{debug, info};

const TITLE_CHARS: usize = 60;

/// An inbound chat message.
#[derive(Debug, Clone, Default)]
pub struct ChatMessage {
    pub text: String,
    /// Non-empty means "analyze with these fragments"
    pub prompt_keys: Vec<String>,
    /// Defaults to selected analysis
    pub analysis_type: Option<AnalysisType>,
    pub document_refs: Vec<String>,
    pub user_type_scope: Option<String>,
}

impl ChatMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_prompt_keys(mut self, keys: Vec<String>) -> Self {
        self.prompt_keys = keys;
        self
    }

    pub fn with_analysis_type(mut self, analysis_type: AnalysisType) -> Self {
        self.analysis_type = Some(analysis_type);
        self
    }

    pub fn with_documents(mut self, document_refs: Vec<String>) -> Self {
        self.document_refs = document_refs;
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.user_type_scope = Some(scope.into());
        self
    }

    fn wants_analysis(&self) -> bool {
        !self.prompt_keys.is_empty()
    }

    /// The analysis request for this message, falling back to `thread_docs`.
    fn analysis_request(&self, thread_docs: &[String]) -> AnalysisRequest {
        let document_refs = if self.document_refs.is_empty() {
            thread_docs.to_vec()
        } else {
            self.document_refs.clone()
        };
        AnalysisRequest {
            analysis_type: self.analysis_type.unwrap_or_default(),
            prompt_keys: self.prompt_keys.clone(),
            document_refs,
            user_context: None,
            user_type_scope: self.user_type_scope.clone(),
        }
    }
}

/// Title for a new thread: the first characters of its opening message.
fn title_from(text: &str) -> String {
    text.trim().chars().take(TITLE_CHARS).collect()
}

/// Routes each message to the analysis engine or a plain continuation and
/// records the user/model pair.
pub struct ChatRouter {
    engine: Arc<AnalysisEngine>,
    store: PromptStore,
    backend: Arc<dyn GenerativeBackend>,
    ledger: Arc<dyn ConversationLedger>,
    scope: Option<String>,
}

impl ChatRouter {
    pub fn new(
        engine: Arc<AnalysisEngine>,
        store: PromptStore,
        backend: Arc<dyn GenerativeBackend>,
        ledger: Arc<dyn ConversationLedger>,
    ) -> Self {
        Self {
            engine,
            store,
            backend,
            ledger,
            scope: None,
        }
    }

    /// Scope for the chat persona when the message names none.
    pub fn with_scope(mut self, scope: Option<String>) -> Self {
        self.scope = scope;
        self
    }

    /// Open a new thread with `message` and return the model's reply.
    ///
    /// Anything that fails after the thread exists is returned as
    /// [`Error::Partial`], so the caller can tell it from a total failure.
    pub async fn start_conversation(&self, user_id: &str, message: ChatMessage) -> Result<Message> {
        validate_text(&message)?;
        if message.wants_analysis() {
            message.analysis_request(&[]).validate()?;
        }

        let id = self
            .ledger
            .create_conversation(user_id, &title_from(&message.text), &message.prompt_keys)
            .await?;
        info!(conversation_id = %id, user_id, analysis = message.wants_analysis(), "Started conversation");

        self.first_turn(&id, &message).await.map_err(|e| Error::Partial {
            conversation_id: id,
            source: Box::new(e),
        })
    }

    async fn first_turn(&self, id: &ConversationId, message: &ChatMessage) -> Result<Message> {
        self.ledger
            .add_message(Message::user(id.clone(), message.text.as_str()))
            .await?;

        let (reply_id, text) = if message.wants_analysis() {
            let request = message.analysis_request(&[]);
            let text = self.engine.analyze(&request).await?;
            if !request.document_refs.is_empty() {
                self.ledger
                    .set_context(id, "", None, &request.document_refs)
                    .await?;
            }
            (id.clone(), text)
        } else {
            let scope = message.user_type_scope.as_deref().or(self.scope.as_deref());
            let system_prompt = self.store.get(scope, catalog::GENERIC_CHAT).await?;
            let reply = self
                .backend
                .start_text_conversation(id, &system_prompt, &message.text)
                .await?;
            (reply.conversation_id, reply.text)
        };

        let reply = Message::model(reply_id, text);
        self.ledger.add_message(reply.clone()).await?;
        Ok(reply)
    }

    /// Send `message` on an existing thread and return the model's reply.
    pub async fn send_message(
        &self,
        conversation_id: &ConversationId,
        user_id: &str,
        message: ChatMessage,
    ) -> Result<Message> {
        validate_text(&message)?;
        let conversation = self
            .ledger
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| PersistenceError::ConversationNotFound(conversation_id.clone()))?;

        let (reply_id, text) = if message.wants_analysis() {
            self.analyze_on_thread(&conversation, &message).await?
        } else {
            debug!(conversation_id = %conversation_id, "Continuing plain conversation");
            let reply = self
                .backend
                .continue_conversation(conversation_id, user_id, &message.text, None)
                .await?;
            (reply.conversation_id, reply.text)
        };

        self.ledger
            .add_message(Message::user(reply_id.clone(), message.text))
            .await?;
        let reply = Message::model(reply_id, text);
        self.ledger.add_message(reply.clone()).await?;
        Ok(reply)
    }

    async fn analyze_on_thread(
        &self,
        conversation: &Conversation,
        message: &ChatMessage,
    ) -> Result<(ConversationId, String)> {
        let request = message.analysis_request(&conversation.document_refs);
        request.validate()?;
        let text = self.engine.analyze(&request).await?;

        // A thread started without documents adopts the first ones it is given.
        if conversation.document_refs.is_empty() && !request.document_refs.is_empty() {
            let system_prompt = conversation.system_prompt.as_deref().unwrap_or_default();
            self.ledger
                .set_context(
                    &conversation.id,
                    system_prompt,
                    conversation.opening_prompt.as_deref(),
                    &request.document_refs,
                )
                .await?;
        }
        Ok((conversation.id.clone(), text))
    }
}

fn validate_text(message: &ChatMessage) -> Result<()> {
    if message.text.trim().is_empty() {
        return Err(Error::Validation("message text is empty".into()));
    }
    Ok(())
}
