use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Host address and port for the HTTP API server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    // --- LLM Provider Args ---
    /// Type of LLM provider for completions (ollama, openai).
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "ollama")]
    pub chat_llm_type: String,

    /// Base URL of the inference endpoint (e.g. http://localhost:11434 for Ollama).
    #[arg(long, env = "OLLAMA_API_BASE", default_value = "http://localhost:11434")]
    pub chat_base_url: String,

    /// API key for the completion provider, if it requires one.
    #[arg(long, env = "CHAT_API_KEY", default_value = "")]
    pub chat_api_key: String,

    // --- Department Tier / Model Args ---
    /// Deployment tier selecting the default model set (lite, pro).
    #[arg(long, env = "AGENCY_TIER", default_value = "pro")]
    pub tier: String,

    /// Model used by the manager to route queries. Overrides the tier default.
    #[arg(long, env = "MANAGER_MODEL")]
    pub manager_model: Option<String>,

    /// Model used for legal Q&A and general chat. Overrides the tier default.
    #[arg(long, env = "CHAT_MODEL")]
    pub chat_model: Option<String>,

    /// Model used for generated-code data analysis. Overrides the tier default.
    #[arg(long, env = "DATA_MODEL")]
    pub data_model: Option<String>,

    /// Model used by the resume optimizer. Overrides the tier default.
    #[arg(long, env = "RESUME_MODEL")]
    pub resume_model: Option<String>,

    // --- Embedding Args ---
    /// Type of LLM provider for text embedding (ollama, openai).
    #[arg(long, env = "EMBEDDING_LLM_TYPE", default_value = "ollama")]
    pub embedding_llm_type: String,

    /// Base URL for the embedding provider. Defaults to the chat base URL.
    #[arg(long, env = "EMBEDDING_BASE_URL")]
    pub embedding_base_url: Option<String>,

    /// API key for the embedding provider, if it requires one.
    #[arg(long, env = "EMBEDDING_API_KEY", default_value = "")]
    pub embedding_api_key: String,

    /// Model name for text embedding.
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "nomic-embed-text")]
    pub embedding_model: String,

    /// Embedding vector dimension.
    #[arg(long, env = "VECTOR_DIMENSION", default_value = "768")]
    pub dimension: usize,

    // --- Vector Store Args ---
    /// Qdrant URL for the document vector store.
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6334")]
    pub qdrant_url: String,

    /// Optional API key for the Qdrant instance.
    #[arg(long, env = "QDRANT_API_KEY")]
    pub qdrant_api_key: Option<String>,

    /// Qdrant collection holding the ingested document chunks.
    #[arg(long, env = "QDRANT_COLLECTION", default_value = "legal_documents")]
    pub collection: String,

    /// Number of chunks to retrieve for each RAG query.
    #[arg(long, env = "RAG_LIMIT", default_value = "3")]
    pub rag_limit: usize,

    // --- History Store Args ---
    /// Path to the SQLite chat history database.
    #[arg(long, env = "HISTORY_DB_PATH", default_value = "history.db")]
    pub history_db_path: String,

    /// How many recent messages to fold into chat prompts.
    #[arg(long, env = "HISTORY_PROMPT_LIMIT", default_value = "6")]
    pub history_prompt_limit: usize,

    // --- Data Department Args ---
    /// Directory where generated charts are written.
    #[arg(long, env = "CHARTS_DIR", default_value = "exports/charts")]
    pub charts_dir: String,

    /// Python interpreter used to execute generated analysis code.
    #[arg(long, env = "PYTHON_BIN", default_value = "python3")]
    pub python_bin: String,

    // --- Prompt Args ---
    /// Path to the prompt configuration file.
    #[arg(long, env = "PROMPTS_PATH", default_value = "json/prompts.json")]
    pub prompts_path: String,
}
