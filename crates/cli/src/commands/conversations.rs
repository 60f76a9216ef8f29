//! `planlens conversations` / `history` / `summarize`: Ledger inspection.

use crate::runtime::{self, Runtime};
use planlens_core::message::ConversationId;
use std::path::Path;

pub async fn list(config_path: Option<&Path>, user_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config(config_path)?;
    let ledger = runtime::ledger(&config).await?;

    let conversations = ledger.list_by_user(user_id).await?;
    if conversations.is_empty() {
        println!("  No conversations for {user_id}.");
        return Ok(());
    }

    println!("  {:<36}  {:<16}  TITLE", "ID", "UPDATED");
    for c in conversations {
        println!(
            "  {:<36}  {:<16}  {}",
            c.id.as_str(),
            c.updated_at.format("%Y-%m-%d %H:%M").to_string(),
            c.title
        );
    }
    Ok(())
}

pub async fn history(
    config_path: Option<&Path>,
    conversation: &str,
    include_summarized: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config(config_path)?;
    let ledger = runtime::ledger(&config).await?;
    let id = ConversationId::from(conversation);

    let Some(thread) = ledger.get_conversation(&id).await? else {
        return Err(format!("Conversation not found: {conversation}").into());
    };

    println!("  {}", thread.title);
    if let Some(summary) = &thread.summary {
        println!("\n  Summary: {summary}");
    }
    for message in ledger.get_messages(&id, include_summarized).await? {
        let marker = if message.is_summarized { " (summarized)" } else { "" };
        println!(
            "\n  [{}] {}{marker}:\n{}",
            message.timestamp.format("%Y-%m-%d %H:%M:%S"),
            message.role.as_str(),
            message.content
        );
    }
    Ok(())
}

pub async fn summarize(
    config_path: Option<&Path>,
    conversation: &str,
    keep: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = runtime::load_config(config_path)?;
    if let Some(keep) = keep {
        config.analysis.summarize_keep_recent = keep;
    }
    let runtime = Runtime::from_config(&config).await?;

    match runtime
        .summarizer
        .summarize(&ConversationId::from(conversation))
        .await?
    {
        Some(summary) => println!("{summary}"),
        None => println!(
            "  Nothing to summarize (≤ {} unsummarized messages).",
            config.analysis.summarize_keep_recent
        ),
    }
    Ok(())
}
