//! Generative backend implementations for PlanLens.
//!
//! All backends implement the `planlens_core::GenerativeBackend` trait.

pub mod gemini;
pub mod retry;

pub use gemini::GeminiBackend;
pub use retry::RetryingBackend;
