//! Builds the analysis components from configuration.

use planlens_analysis::{
    AnalysisEngine, AnalysisOrchestrator, BroadcastObserver, ChatRouter, ConversationSummarizer,
    CorrectiveRetryPolicy, PromptComposer, SequentialAnalysisPipeline,
};
use planlens_config::{AppConfig, LedgerKind, PromptSourceKind};
use planlens_core::{ConversationLedger, FragmentSource, GenerativeBackend};
use planlens_ledger::{InMemoryLedger, SqliteLedger};
use planlens_prompts::{DirectorySource, HttpBlobSource, PromptStore};
use planlens_providers::{GeminiBackend, RetryingBackend};
use std::path::Path;
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error>;

/// Buffered progress events; one comprehensive run emits 2 + 2 per section.
const PROGRESS_CAPACITY: usize = 64;

/// Load config from `path` or the default location, with env overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, BoxError> {
    let config = match path {
        Some(p) => AppConfig::load_with_env(p),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}

pub fn prompt_store(config: &AppConfig) -> Result<PromptStore, BoxError> {
    let source: Arc<dyn FragmentSource> = match config.prompts.source {
        PromptSourceKind::Directory => Arc::new(DirectorySource::new(config.prompts.dir.clone())),
        PromptSourceKind::Http => {
            let base_url = config
                .prompts
                .base_url
                .as_deref()
                .ok_or("prompts.base_url is required for the http source")?;
            Arc::new(HttpBlobSource::new(base_url))
        }
    };
    Ok(PromptStore::new(source))
}

pub async fn ledger(config: &AppConfig) -> Result<Arc<dyn ConversationLedger>, BoxError> {
    match config.ledger.backend {
        LedgerKind::Memory => Ok(Arc::new(InMemoryLedger::new())),
        LedgerKind::Sqlite => {
            if let Some(parent) = config.ledger.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let path = config.ledger.path.to_string_lossy();
            Ok(Arc::new(SqliteLedger::new(&path).await?))
        }
    }
}

pub fn backend(
    config: &AppConfig,
    ledger: Arc<dyn ConversationLedger>,
) -> Result<Arc<dyn GenerativeBackend>, BoxError> {
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    PLANLENS_API_KEY=...   (highest priority)");
        eprintln!("    GEMINI_API_KEY=...");
        eprintln!();
        eprintln!("  Or add it to your config file under [backend]:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let gemini: Arc<dyn GenerativeBackend> = Arc::new(GeminiBackend::from_config(&config.backend, ledger)?);
    if config.backend.max_retries == 0 {
        return Ok(gemini);
    }
    Ok(Arc::new(RetryingBackend::new(gemini, config.backend.max_retries)))
}

/// Every analysis component, wired from one config.
pub struct Runtime {
    pub engine: Arc<AnalysisEngine>,
    pub orchestrator: AnalysisOrchestrator,
    pub router: ChatRouter,
    pub summarizer: ConversationSummarizer,
    /// Comprehensive-analysis progress, for anyone who subscribes
    pub progress: Arc<BroadcastObserver>,
}

impl Runtime {
    pub async fn from_config(config: &AppConfig) -> Result<Self, BoxError> {
        let store = prompt_store(config)?;
        let ledger = ledger(config).await?;
        let backend = backend(config, ledger.clone())?;
        Ok(Self::assemble(config, store, ledger, backend))
    }

    pub fn assemble(
        config: &AppConfig,
        store: PromptStore,
        ledger: Arc<dyn ConversationLedger>,
        backend: Arc<dyn GenerativeBackend>,
    ) -> Self {
        let scope = config.prompts.default_scope.clone();
        let policy = Arc::new(
            CorrectiveRetryPolicy::new(store.clone(), backend.clone())
                .with_sentinels(&config.analysis.failure_sentinels),
        );
        let engine = Arc::new(
            AnalysisEngine::new(PromptComposer::new(store.clone()), policy.clone(), backend.clone())
                .with_default_scope(scope.clone()),
        );
        let progress = Arc::new(BroadcastObserver::new(PROGRESS_CAPACITY));
        let pipeline = Arc::new(
            SequentialAnalysisPipeline::new(store.clone(), backend.clone(), ledger.clone(), policy)
                .with_scope(scope.clone())
                .with_observer(progress.clone()),
        );
        Self {
            orchestrator: AnalysisOrchestrator::new(
                pipeline,
                store.clone(),
                backend.clone(),
                ledger.clone(),
            )
            .with_scope(scope.clone()),
            router: ChatRouter::new(engine.clone(), store.clone(), backend.clone(), ledger.clone())
                .with_scope(scope.clone()),
            summarizer: ConversationSummarizer::new(store, backend, ledger)
                .with_keep_recent(config.analysis.summarize_keep_recent)
                .with_scope(scope),
            engine,
            progress,
        }
    }
}
