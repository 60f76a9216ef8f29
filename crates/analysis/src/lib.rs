//! Analysis orchestration for PlanLens.
//!
//! Builds on the collaborator traits in `planlens-core`:
//!
//! 1. **PromptComposer** turns fragment keys into a prompt
//! 2. **CorrectiveRetryPolicy** spots failure sentinels and re-prompts once
//! 3. **AnalysisEngine** runs single-shot analyses
//! 4. **SequentialAnalysisPipeline** runs the 21-section comprehensive analysis
//! 5. **AnalysisOrchestrator** and **ChatRouter** are the entry points outer
//!    surfaces call; they keep the conversation ledger in step
//!
//! The [`ConversationSummarizer`] folds long threads into a summary.

pub mod catalog;
pub mod chat;
pub mod composer;
pub mod corrective;
pub mod engine;
pub mod orchestrator;
pub mod pipeline;
pub mod summarizer;

pub use catalog::{SECTIONS, SectionSpec};
pub use chat::{ChatMessage, ChatRouter};
pub use composer::PromptComposer;
pub use corrective::{CorrectionOutcome, CorrectiveRetryPolicy};
pub use engine::AnalysisEngine;
pub use orchestrator::{AnalysisOrchestrator, SYSTEM_USER_ID};
pub use pipeline::{
    BroadcastObserver, ComprehensiveReport, PipelineEvent, PipelineObserver, SectionResult,
    SequentialAnalysisPipeline,
};
pub use summarizer::ConversationSummarizer;

#[cfg(test)]
pub(crate) mod test_helpers;
