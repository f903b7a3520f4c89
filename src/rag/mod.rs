use log::info;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    value::Kind,
    with_payload_selector::SelectorOptions as WithPayloadOptions,
    CreateCollectionBuilder,
    Distance,
    PointStruct,
    ScrollPoints,
    SearchPointsBuilder,
    UpsertPointsBuilder,
    VectorParams,
    WithPayloadSelector,
    vectors_config::Config as VectorsConfig,
};
use serde::{ Deserialize, Serialize };
use std::collections::{ HashMap, HashSet };
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::prompt::{ self, PromptConfig };
use crate::llm::chat::ChatClient;
use crate::llm::embedding::EmbeddingClient;

const SCROLL_PAGE_SIZE: u32 = 256;

#[derive(Debug, Error)]
#[error("RagEngine Error: {0}")]
pub struct RagEngineError(pub String);

/// A retrieved document chunk with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub score: f32,
    pub source: String,
    pub text: String,
}

/// Thin wrapper over the Qdrant collection holding document chunks. The
/// chunk layout (payload keys `source` and `text`) is shared with the
/// ingest binary.
pub struct VectorIndex {
    client: Qdrant,
    collection: String,
    dimension: u64,
}

impl VectorIndex {
    pub fn new(
        url: &str,
        api_key: Option<String>,
        collection: &str,
        dimension: usize
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let client = Qdrant::from_url(url).api_key(api_key).build()?;
        Ok(Self {
            client,
            collection: collection.to_string(),
            dimension: dimension as u64,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn ensure_collection(&self) -> Result<(), Box<dyn StdError + Send + Sync>> {
        if !self.client.collection_exists(&self.collection).await? {
            let create = CreateCollectionBuilder::new(self.collection.clone())
                .vectors_config(
                    VectorsConfig::Params(VectorParams {
                        size: self.dimension,
                        distance: Distance::Cosine.into(),
                        ..Default::default()
                    })
                )
                .build();
            self.client.create_collection(create).await?;
            info!("Created Qdrant collection: {}", self.collection);
        }
        Ok(())
    }

    pub async fn search(
        &self,
        embedding: Vec<f32>,
        limit: usize
    ) -> Result<Vec<ScoredChunk>, Box<dyn StdError + Send + Sync>> {
        let response = self.client.search_points(
            SearchPointsBuilder::new(&self.collection, embedding, limit as u64)
                .with_payload(true)
                .build()
        ).await?;

        let mut chunks = Vec::with_capacity(response.result.len());
        for point in response.result {
            let text = payload_string(&point.payload, "text");
            if text.is_empty() {
                continue;
            }
            chunks.push(ScoredChunk {
                score: point.score,
                source: payload_string(&point.payload, "source"),
                text,
            });
        }
        Ok(chunks)
    }

    /// Every distinct `source` payload value in the collection. Used by the
    /// ingest binary to skip files that were already embedded.
    pub async fn existing_sources(
        &self
    ) -> Result<HashSet<String>, Box<dyn StdError + Send + Sync>> {
        let mut sources = HashSet::new();
        let mut offset = None;

        loop {
            let response = self.client.scroll(ScrollPoints {
                collection_name: self.collection.clone(),
                limit: Some(SCROLL_PAGE_SIZE),
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(WithPayloadOptions::Enable(true)),
                }),
                offset,
                ..Default::default()
            }).await?;

            for point in &response.result {
                let source = payload_string(&point.payload, "source");
                if !source.is_empty() {
                    sources.insert(source);
                }
            }

            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        Ok(sources)
    }

    pub async fn upsert_chunks(
        &self,
        chunks: Vec<(String, String, Vec<f32>)>
    ) -> Result<(), Box<dyn StdError + Send + Sync>> {
        if chunks.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = chunks
            .into_iter()
            .map(|(source, text, embedding)| {
                let mut payload = HashMap::new();
                payload.insert(
                    "source".to_string(),
                    qdrant_client::qdrant::Value {
                        kind: Some(Kind::StringValue(source)),
                    }
                );
                payload.insert(
                    "text".to_string(),
                    qdrant_client::qdrant::Value {
                        kind: Some(Kind::StringValue(text)),
                    }
                );
                PointStruct::new(Uuid::new_v4().to_string(), embedding, payload)
            })
            .collect();

        let op = UpsertPointsBuilder::new(&self.collection, points).build();
        self.client.upsert_points(op).await?;
        Ok(())
    }
}

fn payload_string(
    payload: &HashMap<String, qdrant_client::qdrant::Value>,
    key: &str
) -> String {
    match payload.get(key) {
        Some(value) =>
            match &value.kind {
                Some(Kind::StringValue(s)) => s.clone(),
                _ => String::new(),
            }
        None => String::new(),
    }
}

/// Retrieval Q&A: embed the question, pull the top-k chunks, concatenate
/// them into the legal answer template and forward to the chat model.
pub struct RagEngine {
    index: Arc<VectorIndex>,
    chat_client: Arc<dyn ChatClient>,
    embedding_client: Arc<dyn EmbeddingClient>,
    default_limit: usize,
}

impl RagEngine {
    pub fn new(
        index: Arc<VectorIndex>,
        chat_client: Arc<dyn ChatClient>,
        embedding_client: Arc<dyn EmbeddingClient>,
        default_limit: usize
    ) -> Self {
        Self {
            index,
            chat_client,
            embedding_client,
            default_limit,
        }
    }

    pub async fn retrieve(
        &self,
        query: &str,
        limit: Option<usize>
    ) -> Result<Vec<ScoredChunk>, Box<dyn StdError + Send + Sync>> {
        let embed_resp = self.embedding_client
            .embed(query).await
            .map_err(|e| RagEngineError(format!("Embedding failed: {}", e)))?;

        self.index.search(embed_resp.embedding, limit.unwrap_or(self.default_limit)).await
    }

    pub fn format_context(chunks: &[ScoredChunk]) -> String {
        if chunks.is_empty() {
            return "No relevant documents found.".to_string();
        }
        chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Builds the filled legal prompt for a question: retrieval plus
    /// template substitution, without the final completion call.
    pub async fn build_answer_prompt(
        &self,
        config: &PromptConfig,
        question: &str
    ) -> Result<String, Box<dyn StdError + Send + Sync>> {
        let chunks = self.retrieve(question, None).await?;
        info!("Retrieved {} chunks from '{}'", chunks.len(), self.index.collection());
        let context = Self::format_context(&chunks);
        Ok(prompt::get_legal_prompt(config, &context, question)?)
    }

    pub async fn query_and_answer(
        &self,
        config: &PromptConfig,
        question: &str
    ) -> Result<String, Box<dyn StdError + Send + Sync>> {
        let final_prompt = self.build_answer_prompt(config, question).await?;
        let resp = self.chat_client.complete(&final_prompt).await?;
        Ok(resp.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_retrieval_formats_to_placeholder() {
        assert_eq!(RagEngine::format_context(&[]), "No relevant documents found.");
    }

    #[test]
    fn context_concatenates_chunk_texts() {
        let chunks = vec![
            ScoredChunk {
                score: 0.9,
                source: "data/act.txt".to_string(),
                text: "Section 1.".to_string(),
            },
            ScoredChunk {
                score: 0.8,
                source: "data/act.txt".to_string(),
                text: "Section 2.".to_string(),
            }
        ];
        assert_eq!(RagEngine::format_context(&chunks), "Section 1.\nSection 2.");
    }
}
