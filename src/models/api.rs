use serde::{ Serialize, Deserialize };

use crate::models::chat::MessageContent;
use crate::router::Department;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Omitted on the first message; a session is created from it.
    pub session_id: Option<i64>,
    pub message: String,
    /// Path to a CSV file for the data department.
    pub dataset_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: i64,
    pub department: Department,
    pub content: MessageContent,
}

#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    pub resume_text: String,
    pub job_description: String,
}

#[derive(Debug, Serialize)]
pub struct ResumeResponse {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
