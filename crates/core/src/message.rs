//! Message and Conversation domain types.
//!
//! A conversation is the persisted thread behind every analysis or chat:
//! User submits documents → Analysis runs → Model replies are appended → User continues the thread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (thread).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message author. Serialized as `"user"` / `"model"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (or the system user on orchestrated turns)
    User,
    /// The generative model
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "model" => Some(Role::Model),
            _ => None,
        }
    }
}

/// A single message in a conversation. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// The thread this message belongs to
    pub conversation_id: ConversationId,

    /// Who wrote this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Set in bulk once the message has been folded into the conversation summary
    #[serde(default)]
    pub is_summarized: bool,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new user message.
    pub fn user(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self::new(conversation_id, Role::User, content)
    }

    /// Create a new model message.
    pub fn model(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self::new(conversation_id, Role::Model, content)
    }

    fn new(conversation_id: ConversationId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id,
            role,
            content: content.into(),
            is_summarized: false,
            timestamp: Utc::now(),
        }
    }
}

/// A persisted conversation thread. Messages live in the ledger, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID (assigned by the ledger)
    pub id: ConversationId,

    /// Owner of the thread
    pub user_id: String,

    /// Display title
    pub title: String,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the conversation record was last changed
    pub updated_at: DateTime<Utc>,

    /// Rolling summary of messages flagged `is_summarized`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Prompt keys recorded when the conversation was created
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prompt_keys: Vec<String>,

    /// System instruction the thread was seeded with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Opening prompt as the model received it. The persisted first user
    /// message may be a shorter form of it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_prompt: Option<String>,

    /// Documents attached to the thread (re-sent on every continued turn)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub document_refs: Vec<String>,
}

impl Conversation {
    /// Create a new conversation record with a fresh ID.
    pub fn new(user_id: impl Into<String>, title: impl Into<String>, prompt_keys: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            user_id: user_id.into(),
            title: title.into(),
            created_at: now,
            updated_at: now,
            summary: None,
            prompt_keys,
            system_prompt: None,
            opening_prompt: None,
            document_refs: Vec::new(),
        }
    }
}
