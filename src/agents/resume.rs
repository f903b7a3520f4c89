use std::error::Error as StdError;
use std::sync::Arc;

use crate::config::prompt::{ self, PromptConfig };
use crate::llm::chat::ChatClient;

/// Resume text shorter than this is almost certainly a failed extraction
/// (e.g. a scanned PDF), so the optimizer refuses it up front.
const MIN_RESUME_LEN: usize = 50;

/// HR department: rewrites the summary and skills sections of a resume to
/// match a target job description.
pub struct ResumeOptimizer {
    chat_client: Arc<dyn ChatClient>,
}

impl ResumeOptimizer {
    pub fn new(chat_client: Arc<dyn ChatClient>) -> Self {
        Self { chat_client }
    }

    pub async fn optimize(
        &self,
        config: &PromptConfig,
        resume_text: &str,
        job_description: &str
    ) -> Result<String, Box<dyn StdError + Send + Sync>> {
        if resume_text.trim().len() < MIN_RESUME_LEN {
            return Err(
                "Could not read enough text from the resume. Is it a scanned image?".into()
            );
        }
        if job_description.trim().is_empty() {
            return Err("A job description is required.".into());
        }

        let optimize_prompt = prompt::get_resume_prompt(config, resume_text, job_description)?;
        let resp = self.chat_client.complete(&optimize_prompt).await?;
        Ok(resp.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use crate::llm::chat::CompletionResponse;

    struct EchoClient;

    #[async_trait]
    impl ChatClient for EchoClient {
        async fn complete(
            &self,
            prompt: &str
        ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
            Ok(CompletionResponse { response: prompt.to_string() })
        }
    }

    fn optimizer_config() -> PromptConfig {
        let mut response_templates = HashMap::new();
        response_templates.insert(
            "resume_optimizer".to_string(),
            "JD: {job_description} RESUME: {resume_text}".to_string()
        );
        PromptConfig {
            departments: HashMap::new(),
            query_templates: HashMap::new(),
            response_templates,
            last_loaded: None,
        }
    }

    #[tokio::test]
    async fn short_resume_is_rejected() {
        let optimizer = ResumeOptimizer::new(Arc::new(EchoClient));
        let config = optimizer_config();
        let err = optimizer.optimize(&config, "too short", "Senior Rust Engineer").await.unwrap_err();
        assert!(err.to_string().contains("scanned image"));
    }

    #[tokio::test]
    async fn prompt_carries_both_inputs() {
        let optimizer = ResumeOptimizer::new(Arc::new(EchoClient));
        let config = optimizer_config();
        let resume = "Ten years of experience shipping distributed systems in production.";
        let result = optimizer.optimize(&config, resume, "Platform Engineer").await.unwrap();
        assert!(result.contains("JD: Platform Engineer"));
        assert!(result.contains(resume));
    }
}
