//! Analysis request types.
//!
//! An [`AnalysisRequest`] describes one single-shot analysis: which kind of
//! analysis, which prompt fragments to combine and which documents to send.
//! Comprehensive analyses are seeded from [`JobDetails`] instead.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// The kind of analysis being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    /// Persona + one or more selected task fragments
    #[default]
    Selected,
    /// A single renovation fragment used verbatim
    Renovation,
    /// The multi-section pipeline
    Comprehensive,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Selected => "selected",
            AnalysisType::Renovation => "renovation",
            AnalysisType::Comprehensive => "comprehensive",
        }
    }
}

impl std::str::FromStr for AnalysisType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "selected" => Ok(AnalysisType::Selected),
            "renovation" => Ok(AnalysisType::Renovation),
            "comprehensive" => Ok(AnalysisType::Comprehensive),
            other => Err(Error::Validation(format!("unknown analysis type '{other}'"))),
        }
    }
}

/// A single-shot analysis request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub analysis_type: AnalysisType,

    /// Fragment keys, combined in this order
    pub prompt_keys: Vec<String>,

    /// Opaque document URIs sent alongside the prompt
    #[serde(default)]
    pub document_refs: Vec<String>,

    /// Free text the user added to the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_context: Option<String>,

    /// User-type scope handed to the prompt store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type_scope: Option<String>,
}

impl AnalysisRequest {
    pub fn selected(prompt_keys: Vec<String>, document_refs: Vec<String>) -> Self {
        Self {
            analysis_type: AnalysisType::Selected,
            prompt_keys,
            document_refs,
            ..Self::default()
        }
    }

    pub fn renovation(prompt_key: impl Into<String>, document_refs: Vec<String>) -> Self {
        Self {
            analysis_type: AnalysisType::Renovation,
            prompt_keys: vec![prompt_key.into()],
            document_refs,
            ..Self::default()
        }
    }

    pub fn with_user_context(mut self, text: impl Into<String>) -> Self {
        self.user_context = Some(text.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.user_type_scope = Some(scope.into());
        self
    }

    /// Check the request shape. Runs before any fragment fetch or backend call.
    pub fn validate(&self) -> Result<()> {
        validate_prompt_keys(self.analysis_type, &self.prompt_keys)
    }
}

/// Shape rules for the prompt keys of a single-shot analysis.
///
/// Renovation takes exactly one key. Comprehensive is never single-shot.
pub fn validate_prompt_keys(analysis_type: AnalysisType, prompt_keys: &[String]) -> Result<()> {
    match analysis_type {
        AnalysisType::Comprehensive => Err(Error::Validation(
            "comprehensive analysis runs through the sequential pipeline".into(),
        )),
        _ if prompt_keys.is_empty() => {
            Err(Error::Validation("at least one prompt key is required".into()))
        }
        AnalysisType::Renovation if prompt_keys.len() > 1 => Err(Error::Validation(format!(
            "renovation analysis takes exactly one prompt key, got {}",
            prompt_keys.len()
        ))),
        _ => {
            if let Some(blank) = prompt_keys.iter().find(|k| k.trim().is_empty()) {
                return Err(Error::Validation(format!("blank prompt key '{blank}'")));
            }
            Ok(())
        }
    }
}

/// User-entered job specification that seeds a comprehensive analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDetails {
    pub project_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_of_work: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_completion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl JobDetails {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            ..Self::default()
        }
    }

    /// Render as the markdown block sent (and persisted) as the first user turn.
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("**Job Specification**\n");
        let _ = writeln!(out, "- Project: {}", self.project_name);
        let optional = [
            ("Client", &self.client_name),
            ("Site address", &self.site_address),
            ("Job type", &self.job_type),
            ("Scope of work", &self.scope_of_work),
            ("Budget", &self.budget),
            ("Target completion", &self.target_completion),
            ("Notes", &self.notes),
        ];
        for (label, value) in optional {
            if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                let _ = writeln!(out, "- {label}: {v}");
            }
        }
        out.trim_end().to_string()
    }
}
