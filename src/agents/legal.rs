use std::error::Error as StdError;
use std::sync::Arc;

use crate::config::prompt::PromptConfig;
use crate::rag::RagEngine;

/// Legal department: retrieval Q&A over the ingested document collection.
pub struct LegalAgent {
    rag: Arc<RagEngine>,
}

impl LegalAgent {
    pub fn new(rag: Arc<RagEngine>) -> Self {
        Self { rag }
    }

    pub async fn answer(
        &self,
        config: &PromptConfig,
        question: &str
    ) -> Result<String, Box<dyn StdError + Send + Sync>> {
        self.rag.query_and_answer(config, question).await
    }

    /// Retrieval plus template substitution only, for the streaming path.
    pub async fn build_prompt(
        &self,
        config: &PromptConfig,
        question: &str
    ) -> Result<String, Box<dyn StdError + Send + Sync>> {
        self.rag.build_answer_prompt(config, question).await
    }
}
