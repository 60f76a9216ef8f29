//! Shared test doubles for the analysis components.

use crate::catalog;
use async_trait::async_trait;
use planlens_core::backend::{BackendReply, GenerativeBackend};
use planlens_core::error::BackendError;
use planlens_core::ledger::ConversationLedger;
use planlens_core::message::ConversationId;
use planlens_ledger::InMemoryLedger;
use planlens_prompts::{InMemorySource, PromptStore};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One recorded backend invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    StartMultimodal {
        user_id: String,
        document_refs: Vec<String>,
        system_prompt: String,
        prompt: String,
    },
    Continue {
        conversation_id: ConversationId,
        user_id: String,
        message: String,
    },
    StartText {
        conversation_id: ConversationId,
        system_prompt: String,
        message: String,
    },
    Analysis {
        document_refs: Vec<String>,
        prompt: String,
    },
}

/// A backend that records every call and answers from a script.
///
/// Scripted outcomes are consumed in call order; once the script runs out,
/// call N answers `"response N"`. Multimodal starts create the conversation
/// in the attached ledger, like the real adapter.
pub struct RecordingBackend {
    script: Mutex<VecDeque<Result<String, BackendError>>>,
    calls: Mutex<Vec<BackendCall>>,
    ledger: Option<Arc<dyn ConversationLedger>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            ledger: None,
        }
    }

    pub fn then_text(self, text: &str) -> Self {
        self.script.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn then_error(self, error: BackendError) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn ConversationLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn analysis_prompts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Analysis { prompt, .. } => Some(prompt),
                _ => None,
            })
            .collect()
    }

    pub fn continuations(&self) -> Vec<(ConversationId, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Continue {
                    conversation_id,
                    message,
                    ..
                } => Some((conversation_id, message)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: BackendCall) -> Result<String, BackendError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call);
        let n = calls.len();
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("response {n}")))
    }
}

#[async_trait]
impl GenerativeBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    async fn start_multimodal_conversation(
        &self,
        user_id: &str,
        document_refs: &[String],
        system_prompt: &str,
        initial_prompt: &str,
    ) -> Result<BackendReply, BackendError> {
        let text = self.record(BackendCall::StartMultimodal {
            user_id: user_id.to_string(),
            document_refs: document_refs.to_vec(),
            system_prompt: system_prompt.to_string(),
            prompt: initial_prompt.to_string(),
        })?;
        let id = match &self.ledger {
            Some(ledger) => {
                let state = |e: planlens_core::error::PersistenceError| {
                    BackendError::ConversationState(e.to_string())
                };
                let id = ledger
                    .create_conversation(user_id, "New analysis", &[])
                    .await
                    .map_err(state)?;
                ledger
                    .set_context(&id, system_prompt, Some(initial_prompt), document_refs)
                    .await
                    .map_err(state)?;
                id
            }
            None => ConversationId::from("seed-conversation"),
        };
        Ok(BackendReply::new(text, id))
    }

    async fn continue_conversation(
        &self,
        conversation_id: &ConversationId,
        user_id: &str,
        message: &str,
        _prompt_keys: Option<&[String]>,
    ) -> Result<BackendReply, BackendError> {
        let text = self.record(BackendCall::Continue {
            conversation_id: conversation_id.clone(),
            user_id: user_id.to_string(),
            message: message.to_string(),
        })?;
        Ok(BackendReply::new(text, conversation_id.clone()))
    }

    async fn start_text_conversation(
        &self,
        conversation_id: &ConversationId,
        system_prompt: &str,
        message: &str,
    ) -> Result<BackendReply, BackendError> {
        let text = self.record(BackendCall::StartText {
            conversation_id: conversation_id.clone(),
            system_prompt: system_prompt.to_string(),
            message: message.to_string(),
        })?;
        Ok(BackendReply::new(text, conversation_id.clone()))
    }

    async fn perform_multimodal_analysis(
        &self,
        document_refs: &[String],
        prompt: &str,
    ) -> Result<String, BackendError> {
        self.record(BackendCall::Analysis {
            document_refs: document_refs.to_vec(),
            prompt: prompt.to_string(),
        })
    }
}

/// Every catalogue fragment, with recognizable text.
pub fn catalog_source() -> InMemorySource {
    let mut source = InMemorySource::new()
        .with(catalog::SELECTED_PERSONA, "P")
        .with(catalog::SYSTEM_PERSONA, "SYSTEM PERSONA")
        .with(catalog::INITIAL_ANALYSIS, "INITIAL")
        .with(catalog::FAILURE_CORRECTIVE, "CORRECT")
        .with(catalog::REBUTTAL, "REBUT")
        .with(catalog::REVISION, "REVISE")
        .with(catalog::GENERIC_CHAT, "CHAT")
        .with(catalog::SUMMARIZE, "SUMMARIZE");
    for section in &catalog::SECTIONS {
        source = source.with(section.key, &format!("SECTION {}", section.index));
    }
    source
}

/// Recording collaborators wired together.
pub struct Fixture {
    pub source: Arc<InMemorySource>,
    pub store: PromptStore,
    pub backend: Arc<RecordingBackend>,
    pub ledger: Arc<InMemoryLedger>,
}

impl Fixture {
    pub fn new(backend: RecordingBackend) -> Self {
        Self::with_source(catalog_source(), backend)
    }

    pub fn with_source(source: InMemorySource, backend: RecordingBackend) -> Self {
        let source = Arc::new(source);
        let ledger = Arc::new(InMemoryLedger::new());
        Self {
            store: PromptStore::new(source.clone()),
            source,
            backend: Arc::new(backend.with_ledger(ledger.clone())),
            ledger,
        }
    }
}

pub fn docs(uris: &[&str]) -> Vec<String> {
    uris.iter().map(|u| u.to_string()).collect()
}
