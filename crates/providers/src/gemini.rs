//! Gemini backend implementation.
//!
//! Uses the `generateContent` REST endpoint directly.
//!
//! Features:
//! - `x-goog-api-key` header authentication
//! - System persona sent as top-level `systemInstruction`
//! - Documents attached as `fileData` (remote URIs) or `inlineData` (local files, data URIs)
//! - Continued conversations rebuilt from the ledger, since the API is stateless

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use planlens_config::BackendConfig;
use planlens_core::backend::{BackendReply, GenerativeBackend};
use planlens_core::error::BackendError;
use planlens_core::ledger::ConversationLedger;
use planlens_core::message::{Conversation, ConversationId, Message, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-pro";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8192;
const NEW_ANALYSIS_TITLE: &str = "New analysis";

/// Gemini `generateContent` backend.
pub struct GeminiBackend {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    client: reqwest::Client,
    /// Source of conversation history for continued turns
    ledger: Arc<dyn ConversationLedger>,
}

impl GeminiBackend {
    /// Create a new Gemini backend.
    pub fn new(
        api_key: impl Into<String>,
        ledger: Arc<dyn ConversationLedger>,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300)) // long multimodal reports
            .build()
            .map_err(|e| BackendError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: "gemini".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            temperature: 0.4,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            client,
            ledger,
        })
    }

    /// Build from the `[backend]` config section.
    pub fn from_config(
        config: &BackendConfig,
        ledger: Arc<dyn ConversationLedger>,
    ) -> Result<Self, BackendError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            BackendError::NotConfigured(
                "no API key; set PLANLENS_API_KEY or backend.api_key".into(),
            )
        })?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self::new(api_key, ledger)?
            .with_client(client)
            .with_base_url(&config.base_url)
            .with_model(&config.model)
            .with_generation(config.temperature, config.max_output_tokens))
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_generation(mut self, temperature: f32, max_output_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_output_tokens = max_output_tokens;
        self
    }

    fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    /// Guess a MIME type from a document URI's extension. PDFs are the default.
    fn mime_type_for(uri: &str) -> &'static str {
        let path = uri.split(['?', '#']).next().unwrap_or(uri);
        let ext = path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "webp" => "image/webp",
            "heic" => "image/heic",
            "heif" => "image/heif",
            "txt" => "text/plain",
            _ => "application/pdf",
        }
    }

    /// Turn one document reference into a request part.
    async fn document_part(uri: &str) -> Result<Part, BackendError> {
        if uri.starts_with("http://") || uri.starts_with("https://") || uri.starts_with("gs://") {
            return Ok(Part::File {
                file_data: FileData {
                    mime_type: Self::mime_type_for(uri).into(),
                    file_uri: uri.into(),
                },
            });
        }

        if let Some(rest) = uri.strip_prefix("data:") {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| BackendError::Document(format!("malformed data URI: {uri:.40}")))?;
            let mime_type = header
                .strip_suffix(";base64")
                .ok_or_else(|| BackendError::Document("data URI must be base64-encoded".into()))?;
            return Ok(Part::Inline {
                inline_data: Blob {
                    mime_type: mime_type.into(),
                    data: data.into(),
                },
            });
        }

        let path = uri.strip_prefix("file://").unwrap_or(uri);
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| BackendError::Document(format!("{path}: {e}")))?;
        Ok(Part::Inline {
            inline_data: Blob {
                mime_type: Self::mime_type_for(path).into(),
                data: BASE64.encode(bytes),
            },
        })
    }

    async fn document_parts(document_refs: &[String]) -> Result<Vec<Part>, BackendError> {
        let mut parts = Vec::with_capacity(document_refs.len());
        for uri in document_refs {
            parts.push(Self::document_part(uri).await?);
        }
        Ok(parts)
    }

    /// Rebuild the turn list for a continued conversation.
    ///
    /// The opening prompt (if recorded) stands in for the persisted first user
    /// turn, or leads the thread once that turn is folded into the summary.
    /// The summary opens the thread as a user/model exchange, the documents
    /// ride on the first user turn, and consecutive turns with the same role
    /// are merged.
    fn conversation_contents(
        conversation: &Conversation,
        history: &[Message],
        documents: Vec<Part>,
        message: &str,
    ) -> Vec<Content> {
        let mut turns: Vec<(Role, String)> = Vec::with_capacity(history.len() + 4);
        let mut history = history;
        if let Some(opening) = conversation.opening_prompt.as_deref() {
            if conversation.summary.is_none()
                && history.first().is_some_and(|m| m.role == Role::User)
            {
                history = &history[1..];
            }
            turns.push((Role::User, opening.to_string()));
        }
        if let Some(summary) = conversation.summary.as_deref() {
            turns.push((Role::User, format!("Summary of the earlier conversation:\n{summary}")));
            turns.push((Role::Model, "Understood.".into()));
        }
        turns.extend(history.iter().map(|m| (m.role, m.content.clone())));
        turns.push((Role::User, message.to_string()));

        let mut contents: Vec<Content> = Vec::with_capacity(turns.len());
        for (role, text) in turns {
            match contents.last_mut() {
                Some(last) if last.role.as_deref() == Some(role.as_str()) => {
                    last.parts.push(Part::Text { text });
                }
                _ => contents.push(Content::new(role, vec![Part::Text { text }])),
            }
        }

        if let Some(first_user) = contents
            .iter_mut()
            .find(|c| c.role.as_deref() == Some(Role::User.as_str()))
        {
            first_user.parts.splice(0..0, documents);
        }
        contents
    }

    fn build_request(&self, system_prompt: Option<&str>, contents: Vec<Content>) -> GenerateRequest {
        GenerateRequest {
            system_instruction: system_prompt
                .filter(|s| !s.is_empty())
                .map(|s| Content {
                    role: None,
                    parts: vec![Part::Text { text: s.to_string() }],
                }),
            contents,
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }

    /// Pull the answer text out of a response. Thought parts are skipped.
    fn extract_text(response: GenerateResponse) -> Result<String, BackendError> {
        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".into());
            return Err(BackendError::EmptyResponse(format!("prompt blocked: {reason}")));
        };

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| !p.thought)
            .filter_map(|p| p.text)
            .collect();

        if text.trim().is_empty() {
            return Err(BackendError::EmptyResponse(format!(
                "finish reason: {}",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }

    async fn generate(
        &self,
        system_prompt: Option<&str>,
        contents: Vec<Content>,
    ) -> Result<String, BackendError> {
        let body = self.build_request(system_prompt, contents);
        debug!(backend = %self.name, model = %self.model, turns = body.contents.len(), "Sending generateContent request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(30);
            return Err(BackendError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(BackendError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Backend returned error");
            return Err(BackendError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: GenerateResponse =
            response.json().await.map_err(|e| BackendError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        Self::extract_text(api_response)
    }

    async fn load_conversation(&self, id: &ConversationId) -> Result<Conversation, BackendError> {
        self.ledger
            .get_conversation(id)
            .await
            .map_err(|e| BackendError::ConversationState(e.to_string()))?
            .ok_or_else(|| BackendError::ConversationState(format!("unknown conversation {id}")))
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start_multimodal_conversation(
        &self,
        user_id: &str,
        document_refs: &[String],
        system_prompt: &str,
        initial_prompt: &str,
    ) -> Result<BackendReply, BackendError> {
        let mut parts = Self::document_parts(document_refs).await?;
        parts.push(Part::Text {
            text: initial_prompt.to_string(),
        });
        let text = self
            .generate(Some(system_prompt), vec![Content::new(Role::User, parts)])
            .await?;

        // The thread is only recorded once the model has answered.
        let id = self
            .ledger
            .create_conversation(user_id, NEW_ANALYSIS_TITLE, &[])
            .await
            .map_err(|e| BackendError::ConversationState(e.to_string()))?;
        self.ledger
            .set_context(&id, system_prompt, Some(initial_prompt), document_refs)
            .await
            .map_err(|e| BackendError::ConversationState(e.to_string()))?;

        debug!(conversation_id = %id, documents = document_refs.len(), "Started multimodal conversation");
        Ok(BackendReply::new(text, id))
    }

    async fn continue_conversation(
        &self,
        conversation_id: &ConversationId,
        user_id: &str,
        message: &str,
        prompt_keys: Option<&[String]>,
    ) -> Result<BackendReply, BackendError> {
        let conversation = self.load_conversation(conversation_id).await?;
        let history = self
            .ledger
            .get_messages(conversation_id, false)
            .await
            .map_err(|e| BackendError::ConversationState(e.to_string()))?;
        let documents = Self::document_parts(&conversation.document_refs).await?;

        debug!(
            conversation_id = %conversation_id,
            user_id,
            history = history.len(),
            prompt_keys = ?prompt_keys,
            "Continuing conversation"
        );

        let contents = Self::conversation_contents(&conversation, &history, documents, message);
        let text = self
            .generate(conversation.system_prompt.as_deref(), contents)
            .await?;
        Ok(BackendReply::new(text, conversation_id.clone()))
    }

    async fn start_text_conversation(
        &self,
        conversation_id: &ConversationId,
        system_prompt: &str,
        message: &str,
    ) -> Result<BackendReply, BackendError> {
        let contents = vec![Content::new(
            Role::User,
            vec![Part::Text {
                text: message.to_string(),
            }],
        )];
        let text = self.generate(Some(system_prompt), contents).await?;

        self.ledger
            .set_context(conversation_id, system_prompt, None, &[])
            .await
            .map_err(|e| BackendError::ConversationState(e.to_string()))?;
        Ok(BackendReply::new(text, conversation_id.clone()))
    }

    async fn perform_multimodal_analysis(
        &self,
        document_refs: &[String],
        prompt: &str,
    ) -> Result<String, BackendError> {
        let mut parts = Self::document_parts(document_refs).await?;
        parts.push(Part::Text {
            text: prompt.to_string(),
        });
        self.generate(None, vec![Content::new(Role::User, parts)]).await
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        let response = self
            .client
            .get(format!("{}/v1beta/models/{}", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;
        Ok(response.status().is_success())
    }
}

// --- Gemini API types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

impl Content {
    fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            role: Some(role.as_str().to_string()),
            parts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
    File {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}
