pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use futures::{ Future, Stream };
use serde::Deserialize;
use std::error::Error as StdError;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{ LlmConfig, LlmType };
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;

pub type TokenStream = Pin<
    Box<dyn Stream<Item = Result<String, Box<dyn StdError + Send + Sync>>> + Send>
>;

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>>;

    /// Providers with native token streaming override this; the default
    /// buffers the full completion and yields it as a single item.
    async fn complete_stream(
        &self,
        prompt: &str
    ) -> Result<TokenStream, Box<dyn StdError + Send + Sync>> {
        let full = self.complete(prompt).await?;
        full_response_as_stream(move || async move { Ok(full.response) })
    }
}

/// Reassembles newline-delimited records from an HTTP byte stream. Chunk
/// boundaries fall anywhere, including mid-line and mid-codepoint, so bytes
/// are buffered until a complete line (or the end of the stream) arrives.
pub(crate) struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Appends a chunk and drains every complete line, keeping any partial
    /// tail for the next chunk. Trailing `\r` is stripped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// The leftover tail once the stream is exhausted, if any.
    pub fn finish(self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.buf).into_owned())
        }
    }
}

pub fn create_streaming_response<F, Fut>(
    response_fn: F
) -> Result<TokenStream, Box<dyn StdError + Send + Sync>>
    where
        F: FnOnce(mpsc::Sender<Result<String, Box<dyn StdError + Send + Sync>>>) -> Fut +
            Send +
            'static,
        Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}

pub fn full_response_as_stream<F, Fut>(
    response_fn: F
) -> Result<TokenStream, Box<dyn StdError + Send + Sync>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<String, Box<dyn StdError + Send + Sync>>> + Send + 'static
{
    create_streaming_response(move |tx| async move {
        match response_fn().await {
            Ok(response) => {
                let _ = tx.send(Ok(response)).await;
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
            }
        }
    })
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::Ollama => Arc::new(OllamaClient::from_config(config)?),
        LlmType::OpenAI => Arc::new(OpenAIChatClient::from_config(config)?),
    };
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    struct CannedClient;

    #[async_trait]
    impl ChatClient for CannedClient {
        async fn complete(
            &self,
            _prompt: &str
        ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
            Ok(CompletionResponse { response: "answer".to_string() })
        }
    }

    #[tokio::test]
    async fn default_stream_yields_full_completion_once() {
        let client = CannedClient;
        let mut stream = client.complete_stream("hi").await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, "answer");
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn line_split_across_chunks_reassembles() {
        let mut lines = LineBuffer::new();
        assert!(lines.push(b"{\"response\":\"hel").is_empty());
        let complete = lines.push(b"lo\",\"done\":false}\n");
        assert_eq!(complete, vec![r#"{"response":"hello","done":false}"#.to_string()]);
        assert!(lines.finish().is_none());
    }

    #[test]
    fn chunk_boundary_inside_a_codepoint_is_preserved() {
        let text = "caf\u{e9}\n";
        let bytes = text.as_bytes();
        // Split inside the two-byte encoding of 'é'.
        let mut lines = LineBuffer::new();
        assert!(lines.push(&bytes[..4]).is_empty());
        assert_eq!(lines.push(&bytes[4..]), vec!["caf\u{e9}".to_string()]);
    }

    #[test]
    fn multiple_lines_in_one_chunk_all_drain() {
        let mut lines = LineBuffer::new();
        let complete = lines.push(b"first\r\nsecond\nthird");
        assert_eq!(complete, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(lines.finish(), Some("third".to_string()));
    }
}
