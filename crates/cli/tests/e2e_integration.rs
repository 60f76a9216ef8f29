//! End-to-end integration tests for the PlanLens analysis runtime.
//!
//! These tests wire the real prompt store (directory source), the SQLite
//! ledger and the analysis components together, with a scripted backend in
//! place of the generative model.

use std::path::Path;
use std::sync::{Arc, Mutex};

use planlens_analysis::{
    AnalysisEngine, AnalysisOrchestrator, BroadcastObserver, ChatMessage, ChatRouter,
    ConversationSummarizer, CorrectiveRetryPolicy, PipelineEvent, PromptComposer, SECTIONS,
    SequentialAnalysisPipeline, catalog,
};
use planlens_config::{AppConfig, LedgerKind};
use planlens_core::backend::{BackendReply, GenerativeBackend};
use planlens_core::error::{BackendError, Error};
use planlens_core::ledger::ConversationLedger;
use planlens_core::message::{ConversationId, Role};
use planlens_core::request::{AnalysisRequest, JobDetails};
use planlens_ledger::SqliteLedger;
use planlens_prompts::{DirectorySource, PromptStore};

// ── Scripted Backend ─────────────────────────────────────────────────────

/// A backend that answers from a script, then echoes.
///
/// Like the real adapter, a multimodal start opens the conversation in the
/// ledger and records its context.
struct ScriptedBackend {
    script: Mutex<Vec<String>>,
    prompts: Mutex<Vec<String>>,
    ledger: Arc<dyn ConversationLedger>,
}

impl ScriptedBackend {
    fn new(ledger: Arc<dyn ConversationLedger>, script: &[&str]) -> Self {
        Self {
            script: Mutex::new(script.iter().rev().map(|s| s.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
            ledger,
        }
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn answer(&self, prompt: &str) -> String {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.script
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| format!("Reviewed: {}", prompt.lines().next().unwrap_or_default()))
    }
}

#[async_trait::async_trait]
impl GenerativeBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "e2e_scripted"
    }

    async fn start_multimodal_conversation(
        &self,
        user_id: &str,
        document_refs: &[String],
        system_prompt: &str,
        initial_prompt: &str,
    ) -> Result<BackendReply, BackendError> {
        let text = self.answer(initial_prompt);
        let state = |e: planlens_core::PersistenceError| BackendError::ConversationState(e.to_string());
        let id = self
            .ledger
            .create_conversation(user_id, "New analysis", &[])
            .await
            .map_err(state)?;
        self.ledger
            .set_context(&id, system_prompt, Some(initial_prompt), document_refs)
            .await
            .map_err(state)?;
        Ok(BackendReply::new(text, id))
    }

    async fn continue_conversation(
        &self,
        conversation_id: &ConversationId,
        _user_id: &str,
        message: &str,
        _prompt_keys: Option<&[String]>,
    ) -> Result<BackendReply, BackendError> {
        Ok(BackendReply::new(self.answer(message), conversation_id.clone()))
    }

    async fn start_text_conversation(
        &self,
        conversation_id: &ConversationId,
        _system_prompt: &str,
        message: &str,
    ) -> Result<BackendReply, BackendError> {
        Ok(BackendReply::new(self.answer(message), conversation_id.clone()))
    }

    async fn perform_multimodal_analysis(
        &self,
        _document_refs: &[String],
        prompt: &str,
    ) -> Result<String, BackendError> {
        Ok(self.answer(prompt))
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

/// Write every catalogue fragment into `dir`.
fn write_catalog(dir: &Path) {
    let fixed = [
        (catalog::SELECTED_PERSONA, "You are a chartered building surveyor."),
        (catalog::SYSTEM_PERSONA, "You are a construction project analyst."),
        (catalog::INITIAL_ANALYSIS, "Give an initial overview of the drawings."),
        (catalog::FAILURE_CORRECTIVE, "Your last answer failed. Describe what is visible."),
        (catalog::REBUTTAL, "Respond to the client's challenge."),
        (catalog::REVISION, "Revise the analysis as requested."),
        (catalog::GENERIC_CHAT, "You are a helpful construction assistant."),
        (catalog::SUMMARIZE, "Summarize the conversation so far."),
    ];
    for (key, text) in fixed {
        std::fs::write(dir.join(key), text).unwrap();
    }
    for section in &SECTIONS {
        std::fs::write(
            dir.join(section.key),
            format!("Analyze section {}: {}.", section.index, section.title),
        )
        .unwrap();
    }
    std::fs::write(dir.join("structural.txt"), "Check load paths and lintels.").unwrap();
    std::fs::write(dir.join("costing.txt"), "Estimate material costs.").unwrap();
}

struct Harness {
    _dir: tempfile::TempDir,
    db_path: String,
    store: PromptStore,
    ledger: Arc<dyn ConversationLedger>,
    backend: Arc<ScriptedBackend>,
}

impl Harness {
    async fn new(script: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let prompts = dir.path().join("prompts");
        std::fs::create_dir_all(&prompts).unwrap();
        write_catalog(&prompts);

        let db_path = dir.path().join("ledger.db").to_string_lossy().into_owned();
        let ledger: Arc<dyn ConversationLedger> = Arc::new(SqliteLedger::new(&db_path).await.unwrap());
        let backend = Arc::new(ScriptedBackend::new(ledger.clone(), script));

        Self {
            store: PromptStore::new(Arc::new(DirectorySource::new(prompts))),
            _dir: dir,
            db_path,
            ledger,
            backend,
        }
    }

    fn policy(&self) -> Arc<CorrectiveRetryPolicy> {
        Arc::new(CorrectiveRetryPolicy::new(self.store.clone(), self.backend.clone()))
    }

    fn engine(&self) -> Arc<AnalysisEngine> {
        Arc::new(AnalysisEngine::new(
            PromptComposer::new(self.store.clone()),
            self.policy(),
            self.backend.clone(),
        ))
    }

    fn orchestrator(&self) -> AnalysisOrchestrator {
        self.observed_orchestrator(Arc::new(BroadcastObserver::new(64)))
    }

    fn observed_orchestrator(&self, progress: Arc<BroadcastObserver>) -> AnalysisOrchestrator {
        let pipeline = Arc::new(
            SequentialAnalysisPipeline::new(
                self.store.clone(),
                self.backend.clone(),
                self.ledger.clone(),
                self.policy(),
            )
            .with_observer(progress),
        );
        AnalysisOrchestrator::new(
            pipeline,
            self.store.clone(),
            self.backend.clone(),
            self.ledger.clone(),
        )
    }

    fn router(&self) -> ChatRouter {
        ChatRouter::new(
            self.engine(),
            self.store.clone(),
            self.backend.clone(),
            self.ledger.clone(),
        )
    }
}

fn docs() -> Vec<String> {
    vec!["https://plans.example.com/ground-floor.pdf".into()]
}

// ── Single-shot analysis ─────────────────────────────────────────────────

#[tokio::test]
async fn selected_analysis_from_prompt_directory() {
    let h = Harness::new(&["Lintel over the kitchen opening is undersized."]).await;
    let request = AnalysisRequest::selected(
        vec!["structural.txt".into(), "costing.txt".into()],
        docs(),
    )
    .with_user_context("Budget is tight.");

    let report = h.engine().analyze(&request).await.unwrap();

    assert_eq!(report, "Lintel over the kitchen opening is undersized.");
    assert_eq!(
        h.backend.prompts(),
        vec![
            "You are a chartered building surveyor.\n\n\
             Check load paths and lintels.\n\n---\n\n\
             Estimate material costs.\n\n\
             **Additional Context from User:**\nBudget is tight."
                .to_string()
        ]
    );
}

#[tokio::test]
async fn unreadable_blueprint_is_corrected_once() {
    let h = Harness::new(&["BLUEPRINT_UNREADABLE", "Partial review of visible walls."]).await;
    let request = AnalysisRequest::renovation("structural.txt", docs());

    let report = h.engine().analyze(&request).await.unwrap();

    assert_eq!(report, "Partial review of visible walls.");
    let prompts = h.backend.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0], "Check load paths and lintels.");
    assert_eq!(
        prompts[1],
        "Your last answer failed. Describe what is visible.\n\nOriginal Failed Response:\nBLUEPRINT_UNREADABLE"
    );
}

#[tokio::test]
async fn missing_fragment_is_reported_by_key() {
    let h = Harness::new(&[]).await;
    let request = AnalysisRequest::selected(vec!["nonexistent.txt".into()], docs());

    let err = h.engine().analyze(&request).await.unwrap_err();
    assert!(matches!(err, Error::FragmentNotFound { ref key } if key == "nonexistent.txt"));
    assert!(h.backend.prompts().is_empty());
}

// ── Comprehensive pipeline ───────────────────────────────────────────────

#[tokio::test]
async fn comprehensive_analysis_is_persisted_and_survives_reopen() {
    let h = Harness::new(&["Two-storey rear extension, timber frame."]).await;
    let job = JobDetails {
        client_name: Some("J. Okafor".into()),
        budget: Some("£85,000".into()),
        ..JobDetails::new("Okafor Extension")
    };

    let report = h
        .orchestrator()
        .start_full_analysis("alice", &docs(), &job)
        .await
        .unwrap();

    assert!(!report.short_circuited);
    assert_eq!(report.sections.len(), SECTIONS.len());
    assert_eq!(report.sections[6].content, "Reviewed: Analyze section 7: Roofing.");
    assert!(report.full_text().contains("## 21. Compliance & Sign-Off"));

    // Reopen the database from disk
    let reopened = SqliteLedger::new(&h.db_path).await.unwrap();
    let conversation = reopened
        .get_conversation(&report.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.title, "Comprehensive Analysis: Okafor Extension");
    assert_eq!(conversation.document_refs, docs());
    assert_eq!(
        conversation.system_prompt.as_deref(),
        Some("You are a construction project analyst.")
    );
    let opening = conversation.opening_prompt.as_deref().unwrap();
    assert!(opening.starts_with("Give an initial overview of the drawings.\n\n**Job Specification**"));

    let messages = reopened
        .get_messages(&report.conversation_id, true)
        .await
        .unwrap();
    assert_eq!(messages.len(), 2 + 2 * SECTIONS.len());
    assert!(messages[0].content.contains("- Budget: £85,000"));
    assert_eq!(messages[1].content, "Two-storey rear extension, timber frame.");
    assert!(messages.chunks(2).all(|pair| pair[0].role == Role::User && pair[1].role == Role::Model));
}

#[tokio::test]
async fn progress_subscriber_sees_every_section() {
    let h = Harness::new(&[]).await;
    let progress = Arc::new(BroadcastObserver::new(64));
    let mut events = progress.subscribe();

    let report = h
        .observed_orchestrator(progress.clone())
        .start_full_analysis("alice", &docs(), &JobDetails::new("Mill Lane"))
        .await
        .unwrap();

    let mut started = 0;
    let mut completed = 0;
    loop {
        match events.recv().await.unwrap() {
            PipelineEvent::Seeded { corrected, .. } => assert!(!corrected),
            PipelineEvent::SectionStarted { .. } => started += 1,
            PipelineEvent::SectionCompleted { .. } => completed += 1,
            PipelineEvent::Finished {
                conversation_id,
                sections,
                short_circuited,
                ..
            } => {
                assert_eq!(conversation_id, report.conversation_id);
                assert_eq!(sections, SECTIONS.len());
                assert!(!short_circuited);
                break;
            }
        }
    }
    assert_eq!((started, completed), (SECTIONS.len(), SECTIONS.len()));
}

#[tokio::test]
async fn rebuttal_and_revision_extend_the_thread() {
    let h = Harness::new(&[]).await;
    let orchestrator = h.orchestrator();
    let report = orchestrator
        .start_full_analysis("alice", &docs(), &JobDetails::new("Loft"))
        .await
        .unwrap();

    let rebuttal = orchestrator
        .generate_rebuttal(&report.conversation_id, "The beam is oversized.")
        .await
        .unwrap();
    let revision = orchestrator
        .generate_revision(&report.conversation_id, "Use a glulam beam.")
        .await
        .unwrap();

    assert_eq!(rebuttal, "Reviewed: Respond to the client's challenge.");
    assert_eq!(revision, "Reviewed: Revise the analysis as requested.");

    let messages = h
        .ledger
        .get_messages(&report.conversation_id, true)
        .await
        .unwrap();
    let last_user = &messages[messages.len() - 2];
    assert!(last_user.content.ends_with("**Revision Request:**\nUse a glulam beam."));
}

// ── Chat routing ─────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_thread_lifecycle() {
    let h = Harness::new(&["Hello! How can I help?", "Use a 150mm slab."]).await;
    let router = h.router();

    let first = router
        .start_conversation("bob", ChatMessage::new("What slab thickness for a garage?"))
        .await
        .unwrap();
    let second = router
        .send_message(&first.conversation_id, "bob", ChatMessage::new("And for a driveway?"))
        .await
        .unwrap();
    assert_eq!(second.content, "Use a 150mm slab.");

    let analysis = router
        .send_message(
            &first.conversation_id,
            "bob",
            ChatMessage::new("Check these plans")
                .with_prompt_keys(vec!["structural.txt".into()])
                .with_documents(docs()),
        )
        .await
        .unwrap();
    assert!(analysis.content.starts_with("Reviewed: You are a chartered building surveyor."));

    let conversations = h.ledger.list_by_user("bob").await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].title, "What slab thickness for a garage?");
    assert_eq!(conversations[0].document_refs, docs());

    let messages = h.ledger.get_messages(&first.conversation_id, true).await.unwrap();
    assert_eq!(messages.len(), 6);
}

#[tokio::test]
async fn long_thread_is_summarized() {
    let h = Harness::new(&[]).await;
    let router = h.router();
    let first = router
        .start_conversation("carol", ChatMessage::new("Question 0"))
        .await
        .unwrap();
    for i in 1..4 {
        router
            .send_message(&first.conversation_id, "carol", ChatMessage::new(format!("Question {i}")))
            .await
            .unwrap();
    }

    let summarizer = ConversationSummarizer::new(h.store.clone(), h.backend.clone(), h.ledger.clone())
        .with_keep_recent(2);
    let summary = summarizer.summarize(&first.conversation_id).await.unwrap();
    assert_eq!(summary.as_deref(), Some("Reviewed: Summarize the conversation so far."));

    let live = h.ledger.get_messages(&first.conversation_id, false).await.unwrap();
    assert_eq!(live.len(), 2);
    assert_eq!(live[0].content, "Question 3");

    // Already folded: nothing more to do
    assert_eq!(summarizer.summarize(&first.conversation_id).await.unwrap(), None);
}

// ── Configuration & catalogue ────────────────────────────────────────────

#[tokio::test]
async fn config_file_drives_prompt_directory_and_catalogue_check() {
    let dir = tempfile::tempdir().unwrap();
    let prompts = dir.path().join("prompts");
    std::fs::create_dir_all(&prompts).unwrap();
    write_catalog(&prompts);
    std::fs::remove_file(prompts.join(SECTIONS[3].key)).unwrap();

    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            "[prompts]\ndir = {:?}\n\n[ledger]\nbackend = \"memory\"\n",
            prompts.to_string_lossy()
        ),
    )
    .unwrap();

    let config = AppConfig::load_from(&config_path).unwrap();
    assert_eq!(config.ledger.backend, LedgerKind::Memory);

    let store = PromptStore::new(Arc::new(DirectorySource::new(config.prompts.dir.clone())));
    let missing = store
        .verify(None, catalog::required_keys().into_iter())
        .await
        .unwrap();
    assert_eq!(missing, vec![SECTIONS[3].key.to_string()]);
}
