use serde::{ Serialize, Deserialize };

/// Message body. Most messages are plain text; the data department may
/// produce a tagged image record pointing at a rendered chart file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    Text {
        text: String,
    },
    Image {
        path: String,
        text: String,
    },
}

impl MessageContent {
    pub fn text(s: impl Into<String>) -> Self {
        MessageContent::Text { text: s.into() }
    }

    /// Flatten the content into a single display string, used when folding
    /// history into a prompt.
    pub fn as_prompt_text(&self) -> String {
        match self {
            MessageContent::Text { text } => text.clone(),
            MessageContent::Image { path, text } => {
                if text.is_empty() {
                    format!("[chart saved to {}]", path)
                } else {
                    format!("[chart saved to {}] {}", path, text)
                }
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
    pub timestamp: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub messages: Vec<ChatMessage>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: i64,
    pub title: String,
    pub created_at: i64,
}
