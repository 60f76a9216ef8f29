//! Process-wide fragment cache.
//!
//! Entries are never invalidated: a fragment fetched once is served from the
//! cache until the process exits. Two tasks missing the same key at the same
//! time may both fetch it; the later write wins and both see a cached value.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A cloneable handle to a shared fragment cache. Keyed by prompt key only.
#[derive(Clone, Default)]
pub struct FragmentCache {
    entries: Arc<RwLock<HashMap<String, Arc<str>>>>,
}

impl FragmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Arc<str>> {
        self.entries.read().await.get(key).cloned()
    }

    /// Store a fragment and return the cached copy.
    pub async fn insert(&self, key: &str, text: String) -> Arc<str> {
        let text: Arc<str> = Arc::from(text);
        self.entries
            .write()
            .await
            .insert(key.to_string(), Arc::clone(&text));
        text
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every entry. Only for tests and diagnostics.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
