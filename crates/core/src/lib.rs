//! # PlanLens Core
//!
//! Domain types, collaborator traits, and error definitions for the PlanLens
//! construction-document analysis runtime.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here: where prompt fragments are
//! stored, where conversations are persisted, and which generative model
//! answers. Implementations live in their own crates, and the analysis crate
//! only ever talks to the traits, so tests swap in recording doubles.

pub mod backend;
pub mod error;
pub mod fragment;
pub mod ledger;
pub mod message;
pub mod request;

// Re-export key types at crate root for ergonomics
pub use backend::{BackendReply, GenerativeBackend};
pub use error::{BackendError, Error, PersistenceError, Result};
pub use fragment::FragmentSource;
pub use ledger::ConversationLedger;
pub use message::{Conversation, ConversationId, Message, Role};
pub use request::{AnalysisRequest, AnalysisType, JobDetails};
