//! Configuration loading, validation, and management for PlanLens.
//!
//! Loads configuration from `~/.planlens/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.planlens/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generative backend settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Where prompt fragments are loaded from
    #[serde(default)]
    pub prompts: PromptsConfig,

    /// Conversation persistence
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Analysis behavior
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// API key (usually supplied through the environment)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// HTTP client timeout for a single backend call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts after a rate limit or transient failure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn default_model() -> String {
    "gemini-2.5-pro".into()
}
fn default_temperature() -> f32 {
    0.4
}
fn default_max_output_tokens() -> u32 {
    8192
}
fn default_timeout_secs() -> u64 {
    300
}
/// Upper bound accepted for `backend.max_retries`.
pub const MAX_RETRIES: u32 = 10;

fn default_max_retries() -> u32 {
    2
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// Which fragment source backs the prompt store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptSourceKind {
    #[default]
    Directory,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    #[serde(default)]
    pub source: PromptSourceKind,

    /// Root directory for the `directory` source
    #[serde(default = "default_prompts_dir")]
    pub dir: PathBuf,

    /// Container URL for the `http` source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// User-type scope used when a request does not name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_scope: Option<String>,
}

fn default_prompts_dir() -> PathBuf {
    AppConfig::config_dir().join("prompts")
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            source: PromptSourceKind::default(),
            dir: default_prompts_dir(),
            base_url: None,
            default_scope: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub backend: LedgerKind,

    /// SQLite database file
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

fn default_ledger_path() -> PathBuf {
    AppConfig::config_dir().join("ledger.db")
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerKind::default(),
            path: default_ledger_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Response markers that trigger the corrective re-prompt
    #[serde(default = "default_failure_sentinels")]
    pub failure_sentinels: Vec<String>,

    /// Unsummarized messages kept verbatim when a conversation is summarized
    #[serde(default = "default_keep_recent")]
    pub summarize_keep_recent: usize,
}

/// Markers the model emits when it could not complete an analysis.
pub fn default_failure_sentinels() -> Vec<String> {
    vec![
        "BLUEPRINT_UNREADABLE".into(),
        "ANALYSIS_FAILED".into(),
        "I'm sorry, but I can't".into(),
        "I am unable to analyze".into(),
        "I cannot analyze".into(),
    ]
}
fn default_keep_recent() -> usize {
    10
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            failure_sentinels: default_failure_sentinels(),
            summarize_keep_recent: default_keep_recent(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.planlens/config.toml).
    ///
    /// Environment variables override the file:
    /// - `PLANLENS_API_KEY` (highest priority), then `GEMINI_API_KEY`
    /// - `PLANLENS_MODEL`
    /// - `PLANLENS_PROMPTS_DIR`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load a specific file, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("PLANLENS_API_KEY").or_else(|| lookup("GEMINI_API_KEY")) {
            self.backend.api_key = Some(key);
        }
        if let Some(model) = lookup("PLANLENS_MODEL") {
            self.backend.model = model;
        }
        if let Some(dir) = lookup("PLANLENS_PROMPTS_DIR") {
            self.prompts.dir = PathBuf::from(dir);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".planlens")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.backend.temperature) {
            return Err(ConfigError::ValidationError(
                "backend.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.backend.max_retries > MAX_RETRIES {
            return Err(ConfigError::ValidationError(format!(
                "backend.max_retries must be at most {MAX_RETRIES}"
            )));
        }

        if self.backend.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "backend.timeout_secs must be > 0".into(),
            ));
        }

        if self.prompts.source == PromptSourceKind::Http && self.prompts.base_url.is_none() {
            return Err(ConfigError::ValidationError(
                "prompts.base_url is required when prompts.source = \"http\"".into(),
            ));
        }

        if self.analysis.failure_sentinels.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "analysis.failure_sentinels must not contain blank markers".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.backend.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
