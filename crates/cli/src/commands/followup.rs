//! `planlens rebuttal` / `planlens revision`: Follow-ups on an analysis thread.

use crate::runtime::{self, Runtime};
use planlens_core::message::ConversationId;
use std::path::Path;

pub async fn rebuttal(
    config_path: Option<&Path>,
    conversation: &str,
    query: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::from_config(&runtime::load_config(config_path)?).await?;
    let text = runtime
        .orchestrator
        .generate_rebuttal(&ConversationId::from(conversation), query)
        .await?;
    println!("{text}");
    Ok(())
}

pub async fn revision(
    config_path: Option<&Path>,
    conversation: &str,
    request: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = Runtime::from_config(&runtime::load_config(config_path)?).await?;
    let text = runtime
        .orchestrator
        .generate_revision(&ConversationId::from(conversation), request)
        .await?;
    println!("{text}");
    Ok(())
}
