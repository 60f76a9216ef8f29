//! In-memory fragment source: useful for testing and for fragments compiled into a binary.

use async_trait::async_trait;
use planlens_core::error::{Error, Result};
use planlens_core::fragment::FragmentSource;
use std::collections::HashMap;
use std::sync::Mutex;

/// A map-backed source that records every fetch it serves.
#[derive(Default)]
pub struct InMemorySource {
    fragments: HashMap<(Option<String>, String), String>,
    fetches: Mutex<Vec<String>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        pairs
            .into_iter()
            .fold(Self::new(), |source, (key, text)| source.with(key, text))
    }

    /// Add an unscoped fragment.
    pub fn with(mut self, key: &str, text: &str) -> Self {
        self.fragments.insert((None, key.to_string()), text.to_string());
        self
    }

    /// Add a fragment visible only under `scope`.
    pub fn with_scoped(mut self, scope: &str, key: &str, text: &str) -> Self {
        self.fragments
            .insert((Some(scope.to_string()), key.to_string()), text.to_string());
        self
    }

    /// Every key fetched so far, in call order (misses included).
    pub fn fetched_keys(&self) -> Vec<String> {
        self.fetches.lock().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn fetch_count(&self, key: &str) -> usize {
        self.fetched_keys().iter().filter(|k| *k == key).count()
    }

    pub fn total_fetches(&self) -> usize {
        self.fetched_keys().len()
    }
}

#[async_trait]
impl FragmentSource for InMemorySource {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn fetch(&self, scope: Option<&str>, key: &str) -> Result<String> {
        if let Ok(mut fetches) = self.fetches.lock() {
            fetches.push(key.to_string());
        }

        let scoped = scope.and_then(|s| self.fragments.get(&(Some(s.to_string()), key.to_string())));
        scoped
            .or_else(|| self.fragments.get(&(None, key.to_string())))
            .cloned()
            .ok_or_else(|| Error::fragment_not_found(key))
    }
}
