//! The prompt store: cached access to prompt fragments.

use crate::cache::FragmentCache;
use planlens_core::error::{Error, Result};
use planlens_core::fragment::FragmentSource;
use std::sync::Arc;
use tracing::debug;

/// Loads fragments from a [`FragmentSource`] through a [`FragmentCache`].
///
/// The cache is addressed by prompt key alone. The user-type scope is only
/// passed to the source on a miss, so the first scope to load a key decides
/// the cached text for every scope.
#[derive(Clone)]
pub struct PromptStore {
    source: Arc<dyn FragmentSource>,
    cache: FragmentCache,
}

impl PromptStore {
    /// Create a store with its own empty cache.
    pub fn new(source: Arc<dyn FragmentSource>) -> Self {
        Self::with_cache(source, FragmentCache::new())
    }

    /// Create a store that shares an existing cache.
    pub fn with_cache(source: Arc<dyn FragmentSource>, cache: FragmentCache) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &FragmentCache {
        &self.cache
    }

    /// Fetch a fragment, loading it from storage on first use.
    ///
    /// A fragment missing from storage surfaces as [`Error::FragmentNotFound`].
    pub async fn get(&self, scope: Option<&str>, key: &str) -> Result<Arc<str>> {
        if let Some(text) = self.cache.get(key).await {
            debug!(key, "Prompt cache hit");
            return Ok(text);
        }

        debug!(key, scope = scope.unwrap_or("-"), source = self.source.name(), "Prompt cache miss");
        let text = self.source.fetch(scope, key).await?;
        Ok(self.cache.insert(key, text).await)
    }

    /// Return the keys that cannot be loaded. Other storage errors propagate.
    pub async fn verify<'a, I>(&self, scope: Option<&str>, keys: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut missing = Vec::new();
        for key in keys {
            match self.get(scope, key).await {
                Ok(_) => {}
                Err(Error::FragmentNotFound { key }) => missing.push(key),
                Err(e) => return Err(e),
            }
        }
        Ok(missing)
    }
}
