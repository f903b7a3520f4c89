pub mod agent;
pub mod agents;
pub mod cli;
pub mod config;
pub mod history;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod rag;
pub mod router;
pub mod server;

use agent::AgencyAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::RwLock;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Tier: {}", args.tier);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Base URL: {}", args.chat_base_url);
    info!("Embedding LLM Type: {}", args.embedding_llm_type);
    info!("Embedding Model: {}", args.embedding_model);
    info!("Qdrant URL: {}", args.qdrant_url);
    info!("Document Collection: {}", args.collection);
    info!("History DB Path: {}", args.history_db_path);
    info!("Charts Directory: {}", args.charts_dir);
    info!("Prompts Path: {}", args.prompts_path);
    info!("-------------------------");

    let agent_args = args.clone();
    let agent = Arc::new(RwLock::new(AgencyAgent::new(agent_args).await?));
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args);
    server.run().await?;

    Ok(())
}
