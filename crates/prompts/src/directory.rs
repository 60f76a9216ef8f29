//! Directory-backed fragment source.
//!
//! Layout:
//!
//! ```text
//! prompts/
//! ├── persona_selected_analysis.txt
//! ├── section_01_site_logistics.txt
//! └── homeowner/                      # user-type scope
//!     └── persona_selected_analysis.txt
//! ```
//!
//! A scoped file shadows the root file of the same key.

use async_trait::async_trait;
use planlens_core::error::{Error, Result};
use planlens_core::fragment::FragmentSource;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Reads fragments as UTF-8 files under a root directory.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keys and scopes must stay inside the root: no `..`, no absolute paths,
    /// no backslashes.
    fn is_safe(segment: &str) -> bool {
        !segment.is_empty()
            && !segment.contains('\\')
            && Path::new(segment)
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
    }

    async fn read(path: &Path) -> Result<Option<String>> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!("{}: {e}", path.display()))),
        }
    }
}

#[async_trait]
impl FragmentSource for DirectorySource {
    fn name(&self) -> &str {
        "directory"
    }

    async fn fetch(&self, scope: Option<&str>, key: &str) -> Result<String> {
        if !Self::is_safe(key) {
            return Err(Error::fragment_not_found(key));
        }

        if let Some(scope) = scope.filter(|s| Self::is_safe(s)) {
            let scoped = self.root.join(scope).join(key);
            if let Some(text) = Self::read(&scoped).await? {
                debug!(path = %scoped.display(), "Loaded scoped fragment");
                return Ok(text);
            }
        }

        let path = self.root.join(key);
        Self::read(&path)
            .await?
            .ok_or_else(|| Error::fragment_not_found(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("persona.txt"), "root persona").unwrap();
        std::fs::create_dir(dir.path().join("homeowner")).unwrap();
        std::fs::write(dir.path().join("homeowner/persona.txt"), "homeowner persona").unwrap();
        dir
    }

    #[tokio::test]
    async fn reads_root_file() {
        let dir = fixture();
        let source = DirectorySource::new(dir.path());
        assert_eq!(source.fetch(None, "persona.txt").await.unwrap(), "root persona");
    }

    #[tokio::test]
    async fn scoped_file_shadows_root() {
        let dir = fixture();
        let source = DirectorySource::new(dir.path());
        assert_eq!(
            source.fetch(Some("homeowner"), "persona.txt").await.unwrap(),
            "homeowner persona"
        );
        assert_eq!(
            source.fetch(Some("contractor"), "persona.txt").await.unwrap(),
            "root persona"
        );
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = fixture();
        let source = DirectorySource::new(dir.path());
        assert!(matches!(
            source.fetch(None, "absent.txt").await,
            Err(Error::FragmentNotFound { ref key }) if key == "absent.txt"
        ));
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = fixture();
        let source = DirectorySource::new(dir.path().join("homeowner"));
        for key in ["../persona.txt", "/etc/passwd", "a\\b.txt", ""] {
            assert!(
                matches!(source.fetch(None, key).await, Err(Error::FragmentNotFound { .. })),
                "{key} should be rejected"
            );
        }
    }
}
