//! Facade over the analysis entry points used by outer surfaces.

use crate::catalog;
use crate::pipeline::{ComprehensiveReport, SequentialAnalysisPipeline};
use planlens_core::backend::GenerativeBackend;
use planlens_core::error::{Error, PersistenceError, Result};
use planlens_core::ledger::ConversationLedger;
use planlens_core::message::{ConversationId, Message};
use planlens_core::request::JobDetails;
use planlens_prompts::PromptStore;
use std::sync::Arc;
use tracing::info;

/// User id under which rebuttal and revision turns are sent.
pub const SYSTEM_USER_ID: &str = "system";

const CLIENT_QUERY_HEADING: &str = "\n\n**Client Query to Address:**\n";
const REVISION_HEADING: &str = "\n\n**Revision Request:**\n";

pub struct AnalysisOrchestrator {
    pipeline: Arc<SequentialAnalysisPipeline>,
    store: PromptStore,
    backend: Arc<dyn GenerativeBackend>,
    ledger: Arc<dyn ConversationLedger>,
    scope: Option<String>,
}

impl AnalysisOrchestrator {
    pub fn new(
        pipeline: Arc<SequentialAnalysisPipeline>,
        store: PromptStore,
        backend: Arc<dyn GenerativeBackend>,
        ledger: Arc<dyn ConversationLedger>,
    ) -> Self {
        Self {
            pipeline,
            store,
            backend,
            ledger,
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: Option<String>) -> Self {
        self.scope = scope;
        self
    }

    /// Run the comprehensive analysis for a job.
    pub async fn start_full_analysis(
        &self,
        user_id: &str,
        images: &[String],
        job: &JobDetails,
    ) -> Result<ComprehensiveReport> {
        self.pipeline.run(user_id, images, job).await
    }

    /// Answer a client's challenge to an existing analysis.
    pub async fn generate_rebuttal(
        &self,
        conversation_id: &ConversationId,
        client_query: &str,
    ) -> Result<String> {
        self.follow_up(conversation_id, catalog::REBUTTAL, CLIENT_QUERY_HEADING, client_query)
            .await
    }

    /// Revise an existing analysis on request.
    pub async fn generate_revision(
        &self,
        conversation_id: &ConversationId,
        revision_request: &str,
    ) -> Result<String> {
        self.follow_up(conversation_id, catalog::REVISION, REVISION_HEADING, revision_request)
            .await
    }

    /// One follow-up turn on an existing thread. The reply is returned verbatim.
    async fn follow_up(
        &self,
        conversation_id: &ConversationId,
        fragment_key: &str,
        heading: &str,
        text: &str,
    ) -> Result<String> {
        if text.trim().is_empty() {
            return Err(Error::Validation(format!("{fragment_key}: request text is empty")));
        }
        if self.ledger.get_conversation(conversation_id).await?.is_none() {
            return Err(PersistenceError::ConversationNotFound(conversation_id.clone()).into());
        }

        let fragment = self.store.get(self.scope.as_deref(), fragment_key).await?;
        let prompt = format!("{fragment}{heading}{text}");

        info!(conversation_id = %conversation_id, key = fragment_key, "Generating follow-up");
        let reply = self
            .backend
            .continue_conversation(conversation_id, SYSTEM_USER_ID, &prompt, None)
            .await?;

        self.ledger
            .add_message(Message::user(reply.conversation_id.clone(), prompt))
            .await?;
        self.ledger
            .add_message(Message::model(reply.conversation_id, reply.text.clone()))
            .await?;
        Ok(reply.text)
    }
}
