//! SQLite ledger backend.
//!
//! Uses a single SQLite database file with two tables:
//! - `conversations`: one row per thread (title, summary, seeded context)
//! - `messages`: append-only rows, ordered by timestamp then insertion
//!
//! Timestamps are stored as fixed-width RFC 3339 strings so that lexical
//! order matches chronological order.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use planlens_core::error::PersistenceError;
use planlens_core::ledger::ConversationLedger;
use planlens_core::message::{Conversation, ConversationId, Message, Role};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// A production SQLite conversation ledger.
pub struct SqliteLedger {
    pool: SqlitePool,
}

fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn query_failed(context: &str) -> impl Fn(sqlx::Error) -> PersistenceError + '_ {
    move |e| PersistenceError::QueryFailed(format!("{context}: {e}"))
}

impl SqliteLedger {
    /// Open (or create) a ledger database.
    ///
    /// Pass `":memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, PersistenceError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| PersistenceError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // An in-memory database exists per connection, so keep exactly one.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| PersistenceError::Storage(format!("Failed to open SQLite: {e}")))?;

        let ledger = Self { pool };
        ledger.run_migrations().await?;
        info!("SQLite ledger initialized at {path}");
        Ok(ledger)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, PersistenceError> {
        let ledger = Self { pool };
        ledger.run_migrations().await?;
        Ok(ledger)
    }

    async fn run_migrations(&self) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id             TEXT PRIMARY KEY NOT NULL,
                user_id        TEXT NOT NULL,
                title          TEXT NOT NULL,
                created_at     TEXT NOT NULL,
                updated_at     TEXT NOT NULL,
                summary        TEXT,
                prompt_keys    TEXT NOT NULL DEFAULT '[]',
                system_prompt  TEXT,
                opening_prompt TEXT,
                document_refs  TEXT NOT NULL DEFAULT '[]'
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::MigrationFailed(format!("conversations table: {e}")))?;

        // Databases created before opening prompts were recorded lack the column.
        let has_opening: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('conversations') WHERE name = 'opening_prompt'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PersistenceError::MigrationFailed(format!("conversations columns: {e}")))?;
        if has_opening == 0 {
            sqlx::query("ALTER TABLE conversations ADD COLUMN opening_prompt TEXT")
                .execute(&self.pool)
                .await
                .map_err(|e| PersistenceError::MigrationFailed(format!("opening_prompt column: {e}")))?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                iid              INTEGER PRIMARY KEY AUTOINCREMENT,
                id               TEXT UNIQUE NOT NULL,
                conversation_id  TEXT NOT NULL REFERENCES conversations(id),
                role             TEXT NOT NULL,
                content          TEXT NOT NULL,
                is_summarized    INTEGER NOT NULL DEFAULT 0,
                timestamp        TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, timestamp, iid)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::MigrationFailed(format!("messages index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id, updated_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::MigrationFailed(format!("conversations index: {e}")))?;

        debug!("SQLite ledger migrations complete");
        Ok(())
    }

    fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<Conversation, PersistenceError> {
        let get = |col: &str| -> Result<String, PersistenceError> {
            row.try_get(col)
                .map_err(|e| PersistenceError::QueryFailed(format!("{col} column: {e}")))
        };
        let get_opt = |col: &str| -> Result<Option<String>, PersistenceError> {
            row.try_get(col)
                .map_err(|e| PersistenceError::QueryFailed(format!("{col} column: {e}")))
        };

        Ok(Conversation {
            id: ConversationId(get("id")?),
            user_id: get("user_id")?,
            title: get("title")?,
            created_at: parse_timestamp(&get("created_at")?),
            updated_at: parse_timestamp(&get("updated_at")?),
            summary: get_opt("summary")?,
            prompt_keys: serde_json::from_str(&get("prompt_keys")?).unwrap_or_default(),
            system_prompt: get_opt("system_prompt")?,
            opening_prompt: get_opt("opening_prompt")?,
            document_refs: serde_json::from_str(&get("document_refs")?).unwrap_or_default(),
        })
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, PersistenceError> {
        let get = |col: &str| -> Result<String, PersistenceError> {
            row.try_get(col)
                .map_err(|e| PersistenceError::QueryFailed(format!("{col} column: {e}")))
        };
        let role_str = get("role")?;
        let role = Role::parse(&role_str)
            .ok_or_else(|| PersistenceError::QueryFailed(format!("unknown role '{role_str}'")))?;
        let is_summarized: i64 = row
            .try_get("is_summarized")
            .map_err(|e| PersistenceError::QueryFailed(format!("is_summarized column: {e}")))?;

        Ok(Message {
            id: get("id")?,
            conversation_id: ConversationId(get("conversation_id")?),
            role,
            content: get("content")?,
            is_summarized: is_summarized != 0,
            timestamp: parse_timestamp(&get("timestamp")?),
        })
    }

    /// Run an UPDATE on one conversation, reporting a missing row as not found.
    async fn update_conversation<'q>(
        &self,
        id: &ConversationId,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> Result<(), PersistenceError> {
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::Storage(format!("UPDATE failed: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(PersistenceError::ConversationNotFound(id.clone()));
        }
        Ok(())
    }

    fn json(values: &[String]) -> Result<String, PersistenceError> {
        serde_json::to_string(values)
            .map_err(|e| PersistenceError::Storage(format!("JSON serialization: {e}")))
    }
}

#[async_trait]
impl ConversationLedger for SqliteLedger {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_conversation(
        &self,
        user_id: &str,
        title: &str,
        prompt_keys: &[String],
    ) -> Result<ConversationId, PersistenceError> {
        let id = ConversationId(Uuid::new_v4().to_string());
        let now = timestamp(&Utc::now());

        sqlx::query(
            r#"
            INSERT INTO conversations (id, user_id, title, created_at, updated_at, prompt_keys)
            VALUES (?1, ?2, ?3, ?4, ?4, ?5)
            "#,
        )
        .bind(id.as_str())
        .bind(user_id)
        .bind(title)
        .bind(&now)
        .bind(Self::json(prompt_keys)?)
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::Storage(format!("INSERT conversation failed: {e}")))?;

        debug!(conversation_id = %id, "Created conversation");
        Ok(id)
    }

    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, PersistenceError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed("get conversation"))?;
        row.as_ref().map(Self::row_to_conversation).transpose()
    }

    async fn add_message(&self, message: Message) -> Result<(), PersistenceError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PersistenceError::Storage(format!("BEGIN failed: {e}")))?;

        let ts = timestamp(&message.timestamp);
        let touched = sqlx::query("UPDATE conversations SET updated_at = ?2 WHERE id = ?1")
            .bind(message.conversation_id.as_str())
            .bind(timestamp(&Utc::now()))
            .execute(&mut *tx)
            .await
            .map_err(|e| PersistenceError::Storage(format!("UPDATE conversation failed: {e}")))?;
        if touched.rows_affected() == 0 {
            return Err(PersistenceError::ConversationNotFound(message.conversation_id));
        }

        sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, role, content, is_summarized, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&message.id)
        .bind(message.conversation_id.as_str())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.is_summarized as i64)
        .bind(&ts)
        .execute(&mut *tx)
        .await
        .map_err(|e| PersistenceError::Storage(format!("INSERT message failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| PersistenceError::Storage(format!("COMMIT failed: {e}")))?;
        Ok(())
    }

    async fn get_messages(
        &self,
        id: &ConversationId,
        include_summarized: bool,
    ) -> Result<Vec<Message>, PersistenceError> {
        let sql = if include_summarized {
            "SELECT * FROM messages WHERE conversation_id = ?1 ORDER BY timestamp, iid"
        } else {
            "SELECT * FROM messages WHERE conversation_id = ?1 AND is_summarized = 0 ORDER BY timestamp, iid"
        };
        let rows = sqlx::query(sql)
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("get messages"))?;
        rows.iter().map(Self::row_to_message).collect()
    }

    async fn update_summary(
        &self,
        id: &ConversationId,
        summary: &str,
    ) -> Result<(), PersistenceError> {
        let query = sqlx::query("UPDATE conversations SET summary = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id.as_str())
            .bind(summary)
            .bind(timestamp(&Utc::now()));
        self.update_conversation(id, query).await
    }

    async fn mark_summarized(
        &self,
        id: &ConversationId,
        message_ids: &[String],
    ) -> Result<(), PersistenceError> {
        if self.get_conversation(id).await?.is_none() {
            return Err(PersistenceError::ConversationNotFound(id.clone()));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PersistenceError::Storage(format!("BEGIN failed: {e}")))?;
        for message_id in message_ids {
            sqlx::query("UPDATE messages SET is_summarized = 1 WHERE conversation_id = ?1 AND id = ?2")
                .bind(id.as_str())
                .bind(message_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| PersistenceError::Storage(format!("UPDATE message failed: {e}")))?;
        }
        tx.commit()
            .await
            .map_err(|e| PersistenceError::Storage(format!("COMMIT failed: {e}")))?;

        debug!(conversation_id = %id, count = message_ids.len(), "Marked messages summarized");
        Ok(())
    }

    async fn update_title(
        &self,
        id: &ConversationId,
        title: &str,
    ) -> Result<(), PersistenceError> {
        let query = sqlx::query("UPDATE conversations SET title = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id.as_str())
            .bind(title)
            .bind(timestamp(&Utc::now()));
        self.update_conversation(id, query).await
    }

    async fn set_context(
        &self,
        id: &ConversationId,
        system_prompt: &str,
        opening_prompt: Option<&str>,
        document_refs: &[String],
    ) -> Result<(), PersistenceError> {
        let query = sqlx::query(
            "UPDATE conversations SET system_prompt = ?2, opening_prompt = ?3, document_refs = ?4, updated_at = ?5 WHERE id = ?1",
        )
        .bind(id.as_str())
        .bind(system_prompt)
        .bind(opening_prompt)
        .bind(Self::json(document_refs)?)
        .bind(timestamp(&Utc::now()));
        self.update_conversation(id, query).await
    }

    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Conversation>, PersistenceError> {
        let rows = sqlx::query("SELECT * FROM conversations WHERE user_id = ?1 ORDER BY updated_at DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("list conversations"))?;
        rows.iter().map(Self::row_to_conversation).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract;

    #[tokio::test]
    async fn satisfies_ledger_contract() {
        let ledger = SqliteLedger::new(":memory:").await.unwrap();
        contract::run_all(&ledger).await;
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let path = path.to_str().unwrap();

        let id = {
            let ledger = SqliteLedger::new(path).await.unwrap();
            let id = ledger
                .create_conversation("alice", "Garage conversion", &["prompt1.txt".into()])
                .await
                .unwrap();
            ledger.add_message(Message::user(id.clone(), "Is the lintel adequate?")).await.unwrap();
            id
        };

        let ledger = SqliteLedger::new(path).await.unwrap();
        let conv = ledger.get_conversation(&id).await.unwrap().unwrap();
        assert_eq!(conv.title, "Garage conversion");
        assert_eq!(conv.prompt_keys, vec!["prompt1.txt".to_string()]);
        let messages = ledger.get_messages(&id, false).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "Is the lintel adequate?");
    }

    #[tokio::test]
    async fn older_database_gains_opening_prompt_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.db");
        let path = path.to_str().unwrap();

        {
            let options = SqliteConnectOptions::from_str(path).unwrap().create_if_missing(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await
                .unwrap();
            sqlx::query(
                "CREATE TABLE conversations (
                    id TEXT PRIMARY KEY NOT NULL, user_id TEXT NOT NULL, title TEXT NOT NULL,
                    created_at TEXT NOT NULL, updated_at TEXT NOT NULL, summary TEXT,
                    prompt_keys TEXT NOT NULL DEFAULT '[]', system_prompt TEXT,
                    document_refs TEXT NOT NULL DEFAULT '[]')",
            )
            .execute(&pool)
            .await
            .unwrap();
            pool.close().await;
        }

        let ledger = SqliteLedger::new(path).await.unwrap();
        let id = ledger.create_conversation("alice", "Old thread", &[]).await.unwrap();
        ledger
            .set_context(&id, "SYSTEM", Some("INITIAL\n\nJob"), &[])
            .await
            .unwrap();
        let conv = ledger.get_conversation(&id).await.unwrap().unwrap();
        assert_eq!(conv.opening_prompt.as_deref(), Some("INITIAL\n\nJob"));
    }
}
