//! Behavior every [`ConversationLedger`] must share. Run by each backend's tests.

use planlens_core::error::PersistenceError;
use planlens_core::ledger::ConversationLedger;
use planlens_core::message::{ConversationId, Message, Role};
use std::time::Duration;

pub async fn run_all(ledger: &dyn ConversationLedger) {
    create_and_get(ledger).await;
    unknown_conversation(ledger).await;
    messages_keep_call_order(ledger).await;
    summarization_flags(ledger).await;
    title_summary_and_context(ledger).await;
    list_by_user(ledger).await;
}

async fn create_and_get(ledger: &dyn ConversationLedger) {
    let keys = vec!["prompt1.txt".to_string(), "prompt2.txt".to_string()];
    let id = ledger
        .create_conversation("alice", "Rear extension", &keys)
        .await
        .unwrap();

    let conv = ledger.get_conversation(&id).await.unwrap().unwrap();
    assert_eq!(conv.id, id);
    assert_eq!(conv.user_id, "alice");
    assert_eq!(conv.title, "Rear extension");
    assert_eq!(conv.prompt_keys, keys);
    assert!(conv.summary.is_none());
    assert!(conv.system_prompt.is_none());
    assert!(conv.opening_prompt.is_none());
}

async fn unknown_conversation(ledger: &dyn ConversationLedger) {
    let ghost = ConversationId::from("does-not-exist");
    assert!(ledger.get_conversation(&ghost).await.unwrap().is_none());
    assert!(matches!(
        ledger.add_message(Message::user(ghost.clone(), "hello")).await,
        Err(PersistenceError::ConversationNotFound(_))
    ));
    assert!(matches!(
        ledger.update_title(&ghost, "x").await,
        Err(PersistenceError::ConversationNotFound(_))
    ));
    assert!(ledger.get_messages(&ghost, true).await.unwrap().is_empty());
}

async fn messages_keep_call_order(ledger: &dyn ConversationLedger) {
    let id = ledger.create_conversation("bob", "Order", &[]).await.unwrap();
    let contents = ["job spec", "initial", "section 1 prompt", "section 1", "section 2 prompt", "section 2"];
    for (i, content) in contents.iter().enumerate() {
        let msg = if i % 2 == 0 {
            Message::user(id.clone(), *content)
        } else {
            Message::model(id.clone(), *content)
        };
        ledger.add_message(msg).await.unwrap();
    }

    let messages = ledger.get_messages(&id, true).await.unwrap();
    let got: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(got, contents);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Model);
}

async fn summarization_flags(ledger: &dyn ConversationLedger) {
    let id = ledger.create_conversation("carol", "Summary", &[]).await.unwrap();
    let first = Message::user(id.clone(), "old question");
    let second = Message::model(id.clone(), "old answer");
    let third = Message::user(id.clone(), "new question");
    let folded = vec![first.id.clone(), second.id.clone()];
    for m in [first, second, third] {
        ledger.add_message(m).await.unwrap();
    }

    ledger.mark_summarized(&id, &folded).await.unwrap();

    let live = ledger.get_messages(&id, false).await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].content, "new question");

    let all = ledger.get_messages(&id, true).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all[0].is_summarized && all[1].is_summarized && !all[2].is_summarized);
}

async fn title_summary_and_context(ledger: &dyn ConversationLedger) {
    let id = ledger.create_conversation("dave", "Untitled", &[]).await.unwrap();
    ledger.update_title(&id, "Loft conversion").await.unwrap();
    ledger.update_summary(&id, "Discussed dormer options").await.unwrap();
    let docs = vec!["gs://plans/a.pdf".to_string(), "https://x/b.png".to_string()];
    ledger
        .set_context(&id, "You are a surveyor", Some("Review the drawings.\n\nJob"), &docs)
        .await
        .unwrap();

    let conv = ledger.get_conversation(&id).await.unwrap().unwrap();
    assert_eq!(conv.title, "Loft conversion");
    assert_eq!(conv.summary.as_deref(), Some("Discussed dormer options"));
    assert_eq!(conv.system_prompt.as_deref(), Some("You are a surveyor"));
    assert_eq!(conv.opening_prompt.as_deref(), Some("Review the drawings.\n\nJob"));
    assert_eq!(conv.document_refs, docs);
    assert!(conv.updated_at >= conv.created_at);
}

async fn list_by_user(ledger: &dyn ConversationLedger) {
    let older = ledger.create_conversation("erin", "First", &[]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let newer = ledger.create_conversation("erin", "Second", &[]).await.unwrap();
    ledger.create_conversation("frank", "Other", &[]).await.unwrap();

    let listed = ledger.list_by_user("erin").await.unwrap();
    let ids: Vec<_> = listed.iter().map(|c| c.id.clone()).collect();
    assert_eq!(ids, vec![newer.clone(), older.clone()]);

    tokio::time::sleep(Duration::from_millis(5)).await;
    ledger.add_message(Message::user(older.clone(), "bump")).await.unwrap();
    let listed = ledger.list_by_user("erin").await.unwrap();
    assert_eq!(listed[0].id, older);

    assert!(ledger.list_by_user("nobody").await.unwrap().is_empty());
}
