use async_trait::async_trait;
use chrono::Utc;
use log::error;
use rusqlite::{ params, Connection };
use std::error::Error;
use std::path::Path;
use std::sync::Mutex;

use crate::history::HistoryStore;
use crate::models::chat::{ ChatMessage, Conversation, MessageContent, SessionSummary };

const TITLE_LEN: usize = 30;

/// File-backed SQLite store for sessions and messages. The connection sits
/// behind a mutex; every call is a short synchronous statement.
pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
}

impl SqliteHistoryStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                FOREIGN KEY(session_id) REFERENCES sessions(id)
            );"
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn derive_title(first_message: &str) -> String {
        let trimmed = first_message.trim();
        if trimmed.chars().count() <= TITLE_LEN {
            trimmed.to_string()
        } else {
            let head: String = trimmed.chars().take(TITLE_LEN).collect();
            format!("{}...", head)
        }
    }

    /// Chart results are stored as a tagged JSON object; plain text is stored
    /// raw so the table stays readable with ad-hoc queries.
    fn encode_content(content: &MessageContent) -> Result<String, serde_json::Error> {
        match content {
            MessageContent::Text { text } => Ok(text.clone()),
            other => serde_json::to_string(other),
        }
    }

    fn decode_content(raw: &str) -> MessageContent {
        if raw.trim_start().starts_with('{') {
            if let Ok(content) = serde_json::from_str::<MessageContent>(raw) {
                return content;
            }
        }
        MessageContent::text(raw)
    }
}

#[async_trait]
impl HistoryStore for SqliteHistoryStore {
    async fn create_session(
        &self,
        first_message: &str
    ) -> Result<i64, Box<dyn Error + Send + Sync>> {
        let title = Self::derive_title(first_message);
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO sessions (title, created_at) VALUES (?1, ?2)",
            params![title, Utc::now().timestamp()]
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn add_message(
        &self,
        session_id: i64,
        role: &str,
        content: &MessageContent
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let encoded = Self::encode_content(content)?;
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO messages (session_id, role, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![session_id, role, encoded, Utc::now().timestamp()]
        )?;
        Ok(())
    }

    async fn get_conversation(
        &self,
        session_id: i64,
        limit: usize
    ) -> Result<Conversation, Box<dyn Error + Send + Sync>> {
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        let sql_limit: i64 = if limit == 0 { -1 } else { limit as i64 };
        let mut stmt = conn.prepare(
            "SELECT role, content, timestamp FROM (
                SELECT id, role, content, timestamp FROM messages
                WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2
            ) ORDER BY id ASC"
        )?;
        let rows = stmt.query_map(params![session_id, sql_limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            match row {
                Ok((role, raw, timestamp)) => {
                    messages.push(ChatMessage {
                        role,
                        content: Self::decode_content(&raw),
                        timestamp,
                    });
                }
                Err(e) => error!("Error reading history row: {}", e),
            }
        }

        Ok(Conversation { id: session_id, messages })
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, Box<dyn Error + Send + Sync>> {
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        let mut stmt = conn.prepare(
            "SELECT id, title, created_at FROM sessions ORDER BY id DESC"
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SessionSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    async fn delete_session(&self, session_id: i64) -> Result<(), Box<dyn Error + Send + Sync>> {
        let conn = self.conn.lock().map_err(|e| e.to_string())?;
        // Messages first, the foreign key is not enforced with a cascade.
        conn.execute("DELETE FROM messages WHERE session_id = ?1", params![session_id])?;
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store() -> (tempfile::TempDir, SqliteHistoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteHistoryStore::open(dir.path().join("history.db")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn session_is_created_once_and_reused() {
        let (_dir, store) = open_store();
        let sid = store.create_session("What does the Industrial Disputes Act say?").await.unwrap();

        store.add_message(sid, "user", &MessageContent::text("first")).await.unwrap();
        store.add_message(sid, "assistant", &MessageContent::text("reply")).await.unwrap();
        store.add_message(sid, "user", &MessageContent::text("second")).await.unwrap();

        let sessions = store.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, sid);

        let conversation = store.get_conversation(sid, 0).await.unwrap();
        assert_eq!(conversation.messages.len(), 3);
        assert_eq!(conversation.messages[0].role, "user");
        assert_eq!(conversation.messages[1].role, "assistant");
    }

    #[tokio::test]
    async fn title_is_truncated_to_thirty_chars() {
        let (_dir, store) = open_store();
        let long = "a".repeat(80);
        let sid = store.create_session(&long).await.unwrap();

        let sessions = store.list_sessions().await.unwrap();
        let title = &sessions.iter().find(|s| s.id == sid).unwrap().title;
        assert_eq!(title.chars().count(), 33);
        assert!(title.ends_with("..."));
    }

    #[tokio::test]
    async fn delete_session_removes_its_messages() {
        let (_dir, store) = open_store();
        let keep = store.create_session("keep me").await.unwrap();
        let drop = store.create_session("drop me").await.unwrap();
        store.add_message(keep, "user", &MessageContent::text("kept")).await.unwrap();
        store.add_message(drop, "user", &MessageContent::text("gone")).await.unwrap();

        store.delete_session(drop).await.unwrap();

        let sessions = store.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, keep);

        let orphaned = store.get_conversation(drop, 0).await.unwrap();
        assert!(orphaned.messages.is_empty());
        let kept = store.get_conversation(keep, 0).await.unwrap();
        assert_eq!(kept.messages.len(), 1);
    }

    #[tokio::test]
    async fn chart_content_round_trips_as_json() {
        let (_dir, store) = open_store();
        let sid = store.create_session("plot something").await.unwrap();
        let chart = MessageContent::Image {
            path: "exports/charts/chart.png".to_string(),
            text: "Sales by region".to_string(),
        };
        store.add_message(sid, "assistant", &chart).await.unwrap();

        let conversation = store.get_conversation(sid, 0).await.unwrap();
        assert_eq!(conversation.messages[0].content, chart);
    }

    #[tokio::test]
    async fn limit_returns_most_recent_messages_in_order() {
        let (_dir, store) = open_store();
        let sid = store.create_session("counting").await.unwrap();
        for i in 0..10 {
            store.add_message(sid, "user", &MessageContent::text(format!("m{}", i))).await.unwrap();
        }

        let conversation = store.get_conversation(sid, 3).await.unwrap();
        let texts: Vec<String> = conversation.messages
            .iter()
            .map(|m| m.content.as_prompt_text())
            .collect();
        assert_eq!(texts, vec!["m7", "m8", "m9"]);
    }

    #[tokio::test]
    async fn plain_text_with_braces_still_loads() {
        let (_dir, store) = open_store();
        let sid = store.create_session("braces").await.unwrap();
        let tricky = MessageContent::text("{not a tagged record}");
        store.add_message(sid, "user", &tricky).await.unwrap();

        let conversation = store.get_conversation(sid, 0).await.unwrap();
        assert_eq!(conversation.messages[0].content, tricky);
    }
}
