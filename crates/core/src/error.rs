//! Error types for the PlanLens domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each external collaborator has its own bounded-context error.

use crate::message::ConversationId;
use thiserror::Error;

/// The top-level error type for all PlanLens operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Request validation ---
    #[error("Invalid analysis request: {0}")]
    Validation(String),

    // --- Prompt fragments ---
    #[error("Prompt fragment not found: {key}")]
    FragmentNotFound { key: String },

    #[error("Prompt storage error: {0}")]
    Storage(String),

    // --- Generative backend ---
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    // --- Conversation ledger ---
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// A conversation was created but a later step of the same turn failed.
    /// The conversation (and any messages written before the failure) remain.
    #[error("Conversation {conversation_id} was created but the turn failed: {source}")]
    Partial {
        conversation_id: ConversationId,
        #[source]
        source: Box<Error>,
    },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a missing prompt fragment.
    pub fn fragment_not_found(key: impl Into<String>) -> Self {
        Self::FragmentNotFound { key: key.into() }
    }

    /// Whether this error happened after a conversation was already created.
    pub fn created_conversation(&self) -> Option<&ConversationId> {
        match self {
            Self::Partial { conversation_id, .. } => Some(conversation_id),
            _ => None,
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Backend returned no usable content: {0}")]
    EmptyResponse(String),

    #[error("Document could not be attached: {0}")]
    Document(String),

    #[error("Conversation state unavailable: {0}")]
    ConversationState(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(ConversationId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_displays_correctly() {
        let err = Error::Backend(BackendError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn fragment_not_found_names_the_key() {
        let err = Error::fragment_not_found("rebuttal.txt");
        assert_eq!(err.to_string(), "Prompt fragment not found: rebuttal.txt");
    }

    #[test]
    fn partial_error_exposes_conversation() {
        let id = ConversationId::from("conv-1");
        let err = Error::Partial {
            conversation_id: id.clone(),
            source: Box::new(Error::Persistence(PersistenceError::Storage("disk full".into()))),
        };
        assert_eq!(err.created_conversation(), Some(&id));
        assert!(err.to_string().contains("disk full"));
        assert!(Error::Validation("x".into()).created_conversation().is_none());
    }
}
