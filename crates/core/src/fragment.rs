//! FragmentSource trait: durable storage for prompt fragments.
//!
//! Fragments are plain text addressed by a case-sensitive key such as
//! `persona_selected_analysis.txt`, optionally under a user-type scope.

use async_trait::async_trait;
use crate::error::Result;

/// Where prompt fragments live.
///
/// A missing fragment must be reported as [`crate::Error::FragmentNotFound`];
/// sources never substitute an empty string.
#[async_trait]
pub trait FragmentSource: Send + Sync {
    /// The source name (e.g., "directory", "http", "in_memory").
    fn name(&self) -> &str;

    /// Fetch a fragment's text.
    async fn fetch(&self, scope: Option<&str>, key: &str) -> Result<String>;
}
