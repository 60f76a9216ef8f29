//! Prompt fragment loading for PlanLens.
//!
//! [`PromptStore`] is the only way the analysis core reads prompt text. It
//! wraps a [`FragmentSource`](planlens_core::FragmentSource) with an injected
//! [`FragmentCache`] so tests can swap either side.

pub mod cache;
pub mod directory;
pub mod http;
pub mod in_memory;
pub mod store;

pub use cache::FragmentCache;
pub use directory::DirectorySource;
pub use http::HttpBlobSource;
pub use in_memory::InMemorySource;
pub use store::PromptStore;
