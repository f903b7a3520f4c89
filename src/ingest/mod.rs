use log::{ info, warn };
use std::collections::HashSet;
use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::llm::embedding::EmbeddingClient;
use crate::rag::VectorIndex;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

const SUPPORTED_EXTENSIONS: [&str; 3] = ["txt", "md", "csv"];

/// One source file loaded for ingestion.
#[derive(Debug, Clone)]
pub struct Document {
    pub source: String,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct IngestStats {
    pub documents: usize,
    pub chunks: usize,
}

/// Loads every supported file directly under `dir`, skipping file names
/// already present in the collection.
pub fn load_documents(
    dir: &Path,
    already_ingested: &HashSet<String>
) -> Result<(Vec<Document>, usize), Box<dyn StdError + Send + Sync>> {
    let mut documents = Vec::new();
    let mut skipped = 0;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let supported = extension
            .as_deref()
            .map(|e| SUPPORTED_EXTENSIONS.contains(&e))
            .unwrap_or(false);
        if !supported {
            continue;
        }

        let source = entry.file_name().to_string_lossy().to_string();
        if already_ingested.contains(&source) {
            info!("Skipping {}: already in the collection", source);
            skipped += 1;
            continue;
        }

        match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => {
                warn!("Skipping {}: file is empty", source);
                skipped += 1;
            }
            Ok(text) => documents.push(Document { source, text }),
            Err(e) => {
                warn!("Skipping {}: {}", source, e);
                skipped += 1;
            }
        }
    }

    Ok((documents, skipped))
}

/// Fixed-size character windows with overlap between consecutive chunks.
/// `overlap` must be smaller than `chunk_size`.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    assert!(chunk_size > 0 && overlap < chunk_size);

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Embeds and upserts the documents in fixed-size batches. Failed batches
/// are logged and skipped so one bad chunk does not abort the whole run.
pub async fn ingest_documents(
    index: &VectorIndex,
    embedding_client: &Arc<dyn EmbeddingClient>,
    documents: &[Document],
    batch_size: usize
) -> Result<IngestStats, Box<dyn StdError + Send + Sync>> {
    let mut stats = IngestStats { documents: documents.len(), ..Default::default() };

    let mut pending: Vec<(String, String)> = Vec::new();
    for doc in documents {
        for chunk in split_text(&doc.text, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP) {
            pending.push((doc.source.clone(), chunk));
        }
    }
    info!("Embedding {} chunks from {} documents", pending.len(), documents.len());

    for batch in pending.chunks(batch_size.max(1)) {
        let mut embedded = Vec::with_capacity(batch.len());
        let mut batch_ok = true;
        for (source, chunk) in batch {
            match embedding_client.embed(chunk).await {
                Ok(response) => embedded.push((source.clone(), chunk.clone(), response.embedding)),
                Err(e) => {
                    warn!("Embedding failed for a chunk of {}: {}", source, e);
                    batch_ok = false;
                    break;
                }
            }
        }
        if !batch_ok {
            continue;
        }
        let count = embedded.len();
        match index.upsert_chunks(embedded).await {
            Ok(()) => {
                stats.chunks += count;
            }
            Err(e) => warn!("Upsert of {} chunks failed: {}", count, e),
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn splitter_respects_size_and_overlap() {
        let text: String = ('a'..='z').cycle().take(2500).collect();
        let chunks = split_text(&text, 1000, 100);

        assert!(chunks.iter().all(|c| c.chars().count() <= 1000));
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().rev().take(100).collect::<Vec<_>>()
                .into_iter().rev().collect();
            assert!(pair[1].starts_with(&tail));
        }
        // Full text reconstructable from chunk starts.
        let rebuilt: String = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| {
                if i == 0 { c.clone() } else { c.chars().skip(100).collect() }
            })
            .collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn splitter_handles_short_and_empty_input() {
        assert!(split_text("", 1000, 100).is_empty());
        let chunks = split_text("short text", 1000, 100);
        assert_eq!(chunks, vec!["short text".to_string()]);
    }

    #[test]
    fn loader_filters_extensions_and_known_sources() {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in [
            ("contract.txt", "employment terms"),
            ("notes.md", "# scratch"),
            ("sales.csv", "month,revenue\nJan,100"),
            ("image.png", "not text"),
            ("empty.txt", "   "),
        ] {
            let mut f = File::create(dir.path().join(name)).unwrap();
            f.write_all(body.as_bytes()).unwrap();
        }

        let mut known = HashSet::new();
        known.insert("notes.md".to_string());

        let (docs, skipped) = load_documents(dir.path(), &known).unwrap();
        let mut sources: Vec<&str> = docs.iter().map(|d| d.source.as_str()).collect();
        sources.sort();

        assert_eq!(sources, vec!["contract.txt", "sales.csv"]);
        // notes.md (known) and empty.txt; the png is ignored outright.
        assert_eq!(skipped, 2);
    }
}
