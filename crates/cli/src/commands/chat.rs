//! `planlens chat`: Start or continue a conversation.

use crate::runtime::{self, Runtime};
use planlens_analysis::ChatMessage;
use planlens_core::message::ConversationId;
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    user_id: &str,
    conversation: Option<String>,
    text: String,
    keys: Vec<String>,
    docs: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config(config_path)?;
    let runtime = Runtime::from_config(&config).await?;

    let message = ChatMessage::new(text)
        .with_prompt_keys(keys)
        .with_documents(docs);

    let result = match conversation {
        Some(id) => {
            runtime
                .router
                .send_message(&ConversationId(id), user_id, message)
                .await
        }
        None => runtime.router.start_conversation(user_id, message).await,
    };

    let reply = match result {
        Ok(reply) => reply,
        Err(e) => {
            if let Some(id) = e.created_conversation() {
                eprintln!("  Conversation {id} was created; continue it with --conversation {id}");
            }
            return Err(e.into());
        }
    };

    println!("{}", reply.content);
    eprintln!();
    eprintln!("  Conversation: {}", reply.conversation_id);
    Ok(())
}
