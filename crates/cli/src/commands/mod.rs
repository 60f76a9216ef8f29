//! Subcommand implementations.

pub mod analyze;
pub mod chat;
pub mod comprehensive;
pub mod conversations;
pub mod doctor;
pub mod followup;
pub mod onboard;
