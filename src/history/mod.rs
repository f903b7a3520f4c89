mod sqlite;

use async_trait::async_trait;
use log::info;
use std::error::Error;
use std::sync::Arc;

use crate::cli::Args;
use crate::models::chat::{ Conversation, MessageContent, SessionSummary };

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Creates a session titled after the first message, returning its id.
    async fn create_session(
        &self,
        first_message: &str
    ) -> Result<i64, Box<dyn Error + Send + Sync>>;

    async fn add_message(
        &self,
        session_id: i64,
        role: &str,
        content: &MessageContent
    ) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Most recent `limit` messages in chronological order; `limit` 0 means
    /// the full conversation.
    async fn get_conversation(
        &self,
        session_id: i64,
        limit: usize
    ) -> Result<Conversation, Box<dyn Error + Send + Sync>>;

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, Box<dyn Error + Send + Sync>>;

    /// Removes the session and all of its messages.
    async fn delete_session(&self, session_id: i64) -> Result<(), Box<dyn Error + Send + Sync>>;
}

pub fn initialize_history_store(
    args: &Args
) -> Result<Arc<dyn HistoryStore>, Box<dyn Error + Send + Sync>> {
    info!("Chat history will be stored in: {}", args.history_db_path);
    let store = sqlite::SqliteHistoryStore::open(&args.history_db_path)?;
    Ok(Arc::new(store))
}

pub fn format_history_for_prompt(conversation: &Conversation) -> String {
    if conversation.messages.is_empty() {
        return String::new();
    }
    let mut result = String::from("Previous conversation:\n");
    for msg in &conversation.messages {
        let role_display = match msg.role.as_str() {
            "user" => "User",
            "assistant" => "Assistant",
            other => other,
        };

        result.push_str(&format!("{}: {}\n", role_display, msg.content.as_prompt_text()));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::ChatMessage;

    #[test]
    fn empty_history_formats_to_nothing() {
        let conversation = Conversation { id: 1, messages: vec![] };
        assert_eq!(format_history_for_prompt(&conversation), "");
    }

    #[test]
    fn history_renders_roles_and_chart_markers() {
        let conversation = Conversation {
            id: 1,
            messages: vec![
                ChatMessage {
                    role: "user".to_string(),
                    content: MessageContent::text("plot sales"),
                    timestamp: 1,
                },
                ChatMessage {
                    role: "assistant".to_string(),
                    content: MessageContent::Image {
                        path: "exports/charts/chart.png".to_string(),
                        text: "Total: 42".to_string(),
                    },
                    timestamp: 2,
                }
            ],
        };
        let formatted = format_history_for_prompt(&conversation);
        assert!(formatted.starts_with("Previous conversation:\n"));
        assert!(formatted.contains("User: plot sales"));
        assert!(formatted.contains("Assistant: [chart saved to exports/charts/chart.png] Total: 42"));
    }
}
