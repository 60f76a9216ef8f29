//! The comprehensive analysis: a seeded multimodal conversation followed by
//! every catalogue section, one turn each, strictly in order.
//!
//! Each turn goes through the corrective policy before anything is written
//! to the ledger, so an interrupted step leaves no partial messages behind.

use crate::catalog::{self, SECTIONS, SectionSpec};
use crate::corrective::CorrectiveRetryPolicy;
use chrono::{DateTime, Utc};
use planlens_core::backend::GenerativeBackend;
use planlens_core::error::{Error, Result};
use planlens_core::ledger::ConversationLedger;
use planlens_core::message::{ConversationId, Message};
use planlens_core::request::JobDetails;
use planlens_prompts::PromptStore;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{Instrument, info, info_span};

/// One finished section of a comprehensive report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionResult {
    pub index: u8,
    pub key: String,
    pub title: String,
    pub content: String,
}

/// The result of a comprehensive analysis.
#[derive(Debug, Clone, Serialize)]
pub struct ComprehensiveReport {
    pub conversation_id: ConversationId,
    /// The seed response (after correction)
    pub initial: String,
    pub sections: Vec<SectionResult>,
    /// The seed failed and was corrected, so no section ran
    pub short_circuited: bool,
}

impl ComprehensiveReport {
    /// The whole report as one markdown document.
    pub fn full_text(&self) -> String {
        let mut out = self.initial.clone();
        for section in &self.sections {
            let _ = write!(out, "\n\n## {}. {}\n\n{}", section.index, section.title, section.content);
        }
        out
    }
}

/// Progress of a running pipeline.
#[derive(Debug, Clone, Serialize)]
pub enum PipelineEvent {
    Seeded {
        conversation_id: ConversationId,
        corrected: bool,
        timestamp: DateTime<Utc>,
    },
    SectionStarted {
        index: u8,
        total: usize,
        title: String,
        timestamp: DateTime<Utc>,
    },
    SectionCompleted {
        index: u8,
        total: usize,
        corrected: bool,
        timestamp: DateTime<Utc>,
    },
    Finished {
        conversation_id: ConversationId,
        sections: usize,
        short_circuited: bool,
        timestamp: DateTime<Utc>,
    },
}

/// Receives pipeline progress.
pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Fans pipeline events out over a `tokio::sync::broadcast` channel.
pub struct BroadcastObserver {
    sender: broadcast::Sender<PipelineEvent>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl PipelineObserver for BroadcastObserver {
    fn on_event(&self, event: &PipelineEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event.clone());
    }
}

/// Drives the comprehensive analysis protocol.
pub struct SequentialAnalysisPipeline {
    store: PromptStore,
    backend: Arc<dyn GenerativeBackend>,
    ledger: Arc<dyn ConversationLedger>,
    policy: Arc<CorrectiveRetryPolicy>,
    sections: Vec<SectionSpec>,
    observer: Option<Arc<dyn PipelineObserver>>,
    scope: Option<String>,
}

impl SequentialAnalysisPipeline {
    pub fn new(
        store: PromptStore,
        backend: Arc<dyn GenerativeBackend>,
        ledger: Arc<dyn ConversationLedger>,
        policy: Arc<CorrectiveRetryPolicy>,
    ) -> Self {
        Self {
            store,
            backend,
            ledger,
            policy,
            sections: SECTIONS.to_vec(),
            observer: None,
            scope: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_scope(mut self, scope: Option<String>) -> Self {
        self.scope = scope;
        self
    }

    pub fn sections(&self) -> &[SectionSpec] {
        &self.sections
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }

    /// Run the whole protocol for one job.
    ///
    /// Errors before the backend opens the conversation are returned as-is.
    /// Anything later is wrapped in [`Error::Partial`] with the conversation id.
    pub async fn run(
        &self,
        user_id: &str,
        document_refs: &[String],
        job: &JobDetails,
    ) -> Result<ComprehensiveReport> {
        if job.project_name.trim().is_empty() {
            return Err(Error::Validation("job project name is required".into()));
        }
        if document_refs.is_empty() {
            return Err(Error::Validation(
                "comprehensive analysis needs at least one document".into(),
            ));
        }

        let scope = self.scope.as_deref();
        let persona = self.store.get(scope, catalog::SYSTEM_PERSONA).await?;
        let initial = self.store.get(scope, catalog::INITIAL_ANALYSIS).await?;
        let job_block = job.to_markdown();
        let seed_prompt = format!("{initial}\n\n{job_block}");

        info!(user_id, project = %job.project_name, documents = document_refs.len(), "Starting comprehensive analysis");
        let reply = self
            .backend
            .start_multimodal_conversation(user_id, document_refs, &persona, &seed_prompt)
            .await?;

        let conversation_id = reply.conversation_id.clone();
        self.continue_run(user_id, document_refs, job, &job_block, &seed_prompt, reply.text, conversation_id.clone())
            .await
            .map_err(|e| Error::Partial {
                conversation_id,
                source: Box::new(e),
            })
    }

    #[allow(clippy::too_many_arguments)]
    async fn continue_run(
        &self,
        user_id: &str,
        document_refs: &[String],
        job: &JobDetails,
        job_block: &str,
        seed_prompt: &str,
        seed_response: String,
        seed_id: ConversationId,
    ) -> Result<ComprehensiveReport> {
        let scope = self.scope.as_deref();

        let seed = self
            .policy
            .apply_if_needed(document_refs, seed_prompt, scope, seed_response)
            .await?;
        self.persist_turn(&seed_id, job_block, seed.text()).await?;
        self.ledger
            .update_title(&seed_id, &format!("Comprehensive Analysis: {}", job.project_name))
            .await?;
        self.emit(PipelineEvent::Seeded {
            conversation_id: seed_id.clone(),
            corrected: seed.was_corrected(),
            timestamp: Utc::now(),
        });

        let short_circuited = seed.was_corrected();
        let mut report = ComprehensiveReport {
            conversation_id: seed_id,
            initial: seed.into_text(),
            sections: Vec::with_capacity(self.sections.len()),
            short_circuited,
        };

        if short_circuited {
            info!(conversation_id = %report.conversation_id, "Seed response failed; skipping sections");
        } else {
            let total = self.sections.len();
            for section in &self.sections {
                let span = info_span!("section", section = section.index, key = section.key);
                let (next_id, result) = self
                    .run_section(&report.conversation_id, user_id, document_refs, section, total)
                    .instrument(span)
                    .await?;
                report.conversation_id = next_id;
                report.sections.push(result);
            }
        }

        self.emit(PipelineEvent::Finished {
            conversation_id: report.conversation_id.clone(),
            sections: report.sections.len(),
            short_circuited: report.short_circuited,
            timestamp: Utc::now(),
        });
        info!(conversation_id = %report.conversation_id, sections = report.sections.len(), "Comprehensive analysis finished");
        Ok(report)
    }

    async fn run_section(
        &self,
        conversation_id: &ConversationId,
        user_id: &str,
        document_refs: &[String],
        section: &SectionSpec,
        total: usize,
    ) -> Result<(ConversationId, SectionResult)> {
        let scope = self.scope.as_deref();
        self.emit(PipelineEvent::SectionStarted {
            index: section.index,
            total,
            title: section.title.to_string(),
            timestamp: Utc::now(),
        });

        let fragment = self.store.get(scope, section.key).await?;
        let reply = self
            .backend
            .continue_conversation(conversation_id, user_id, &fragment, None)
            .await?;
        let outcome = self
            .policy
            .apply_if_needed(document_refs, &fragment, scope, reply.text)
            .await?;

        self.persist_turn(&reply.conversation_id, &fragment, outcome.text())
            .await?;
        self.emit(PipelineEvent::SectionCompleted {
            index: section.index,
            total,
            corrected: outcome.was_corrected(),
            timestamp: Utc::now(),
        });

        let result = SectionResult {
            index: section.index,
            key: section.key.to_string(),
            title: section.title.to_string(),
            content: outcome.into_text(),
        };
        Ok((reply.conversation_id, result))
    }

    async fn persist_turn(&self, id: &ConversationId, prompt: &str, response: &str) -> Result<()> {
        self.ledger.add_message(Message::user(id.clone(), prompt)).await?;
        self.ledger.add_message(Message::model(id.clone(), response)).await?;
        Ok(())
    }
}
