//! SQLite-backed chat persistence.
//!
//! A single connection guarded by an async mutex. Access patterns here are
//! short point queries; serializing them keeps the store `Send + Sync`
//! without a pool.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{Chat, Message, MessageRole, QueryResult};

pub struct ChatStore {
    conn: Mutex<Connection>,
}

impl ChatStore {
    /// Open (or create) the database at `path` and ensure the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        info!(path = %path.display(), "chat store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub async fn create_chat(&self, title: &str, domain: &str) -> Result<Chat, StoreError> {
        let chat = Chat {
            id: Uuid::new_v4(),
            title: title.to_string(),
            domain: domain.to_string(),
            created_at: Utc::now(),
        };
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO chats (id, title, domain, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                chat.id.to_string(),
                chat.title,
                chat.domain,
                chat.created_at.to_rfc3339(),
            ],
        )?;
        Ok(chat)
    }

    pub async fn get_chat(&self, chat_id: Uuid) -> Result<Option<Chat>, StoreError> {
        let conn = self.conn.lock().await;
        let chat = conn
            .query_row(
                "SELECT id, title, domain, created_at FROM chats WHERE id = ?1",
                params![chat_id.to_string()],
                row_to_chat,
            )
            .optional()?;
        Ok(chat)
    }

    /// All chats, newest first.
    pub async fn list_chats(&self) -> Result<Vec<Chat>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, title, domain, created_at FROM chats ORDER BY created_at DESC, rowid DESC",
        )?;
        let chats = stmt
            .query_map([], row_to_chat)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(chats)
    }

    /// Append a message to an existing chat. The chat must exist.
    pub async fn append_message(
        &self,
        chat_id: Uuid,
        role: MessageRole,
        content: &str,
        metadata: Option<&QueryResult>,
    ) -> Result<Message, StoreError> {
        let conn = self.conn.lock().await;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM chats WHERE id = ?1)",
            params![chat_id.to_string()],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StoreError::ChatNotFound { chat_id });
        }

        let message = Message {
            id: Uuid::new_v4(),
            chat_id,
            role,
            content: content.to_string(),
            metadata: metadata.cloned(),
            timestamp: Utc::now(),
        };
        let metadata_json = message
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Database {
                message: format!("metadata serialization failed: {e}"),
            })?;
        conn.execute(
            "INSERT INTO messages (id, chat_id, role, content, metadata, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id.to_string(),
                message.chat_id.to_string(),
                message.role.as_str(),
                message.content,
                metadata_json,
                message.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(message)
    }

    /// Messages for a chat in insertion order. Unknown chats yield an
    /// empty list rather than an error.
    pub async fn get_messages(&self, chat_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, chat_id, role, content, metadata, timestamp
             FROM messages WHERE chat_id = ?1 ORDER BY rowid ASC",
        )?;
        let messages = stmt
            .query_map(params![chat_id.to_string()], row_to_message)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    /// Delete a chat and its messages. Deleting a missing chat is a no-op.
    pub async fn delete_chat(&self, chat_id: Uuid) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM messages WHERE chat_id = ?1",
            params![chat_id.to_string()],
        )?;
        conn.execute("DELETE FROM chats WHERE id = ?1", params![chat_id.to_string()])?;
        Ok(())
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS chats (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            domain TEXT NOT NULL DEFAULT 'general',
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            chat_id TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            metadata TEXT,
            timestamp TEXT NOT NULL,
            FOREIGN KEY (chat_id) REFERENCES chats (id)
        );",
    )?;
    Ok(())
}

fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
    let id: String = row.get(0)?;
    let created_at: String = row.get(3)?;
    Ok(Chat {
        id: parse_uuid(&id, 0)?,
        title: row.get(1)?,
        domain: row.get(2)?,
        created_at: parse_timestamp(&created_at, 3)?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id: String = row.get(0)?;
    let chat_id: String = row.get(1)?;
    let role: String = row.get(2)?;
    let metadata: Option<String> = row.get(4)?;
    let timestamp: String = row.get(5)?;

    let role = role.parse::<MessageRole>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
    })?;
    let metadata = metadata
        .map(|raw| serde_json::from_str::<QueryResult>(&raw))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Message {
        id: parse_uuid(&id, 0)?,
        chat_id: parse_uuid(&chat_id, 1)?,
        role,
        content: row.get(3)?,
        metadata,
        timestamp: parse_timestamp(&timestamp, 5)?,
    })
}

fn parse_uuid(raw: &str, column: usize) -> rusqlite::Result<Uuid> {
    raw.parse::<Uuid>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_timestamp(raw: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}
