use clap::Parser;
use dotenv::dotenv;
use log::info;
use std::error::Error;
use std::path::PathBuf;

use agency_manager::ingest::{ ingest_documents, load_documents };
use agency_manager::llm::embedding::new_client as new_embedding_client;
use agency_manager::llm::LlmConfig;
use agency_manager::rag::VectorIndex;

/// Loads documents from a directory, chunks and embeds them, and upserts
/// the vectors into the legal document collection.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct IngestArgs {
    /// Directory containing the documents to ingest (.txt, .md, .csv).
    #[arg(long, env = "DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Type of LLM provider for embeddings (ollama, openai).
    #[arg(long, env = "EMBEDDING_LLM_TYPE", default_value = "ollama")]
    embedding_llm_type: String,

    /// Base URL of the embedding provider.
    #[arg(long, env = "EMBEDDING_BASE_URL", default_value = "http://localhost:11434")]
    embedding_base_url: String,

    /// API key for the embedding provider, if it needs one.
    #[arg(long, env = "EMBEDDING_API_KEY", default_value = "")]
    embedding_api_key: String,

    /// Embedding model name.
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "nomic-embed-text")]
    embedding_model: String,

    /// Dimension of the embedding vectors.
    #[arg(long, env = "EMBEDDING_DIMENSION", default_value_t = 768)]
    dimension: usize,

    /// Qdrant server URL.
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6334")]
    qdrant_url: String,

    /// Qdrant API key, if the server requires one.
    #[arg(long, env = "QDRANT_API_KEY")]
    qdrant_api_key: Option<String>,

    /// Name of the document collection.
    #[arg(long, env = "DOCUMENT_COLLECTION", default_value = "legal_documents")]
    collection: String,

    /// Number of chunks embedded and upserted per batch.
    #[arg(long, default_value_t = 5)]
    batch_size: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = IngestArgs::parse();

    let embedding_config = LlmConfig {
        llm_type: args.embedding_llm_type.parse()?,
        api_key: Some(args.embedding_api_key.clone()).filter(|k| !k.is_empty()),
        completion_model: None,
        embedding_model: Some(args.embedding_model.clone()),
        base_url: Some(args.embedding_base_url.clone()),
    };
    let embedding_client = new_embedding_client(&embedding_config)?;

    let index = VectorIndex::new(
        &args.qdrant_url,
        args.qdrant_api_key.clone(),
        &args.collection,
        args.dimension
    )?;
    index.ensure_collection().await?;

    let already_ingested = index.existing_sources().await?;
    info!("Collection '{}' already holds {} sources", args.collection, already_ingested.len());

    let (documents, skipped) = load_documents(&args.data_dir, &already_ingested)?;
    if documents.is_empty() {
        info!("Nothing to ingest ({} files skipped)", skipped);
        return Ok(());
    }

    let stats = ingest_documents(&index, &embedding_client, &documents, args.batch_size).await?;

    info!(
        "Ingest complete: {} documents, {} chunks upserted, {} files skipped",
        stats.documents,
        stats.chunks,
        skipped
    );
    Ok(())
}
