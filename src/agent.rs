use futures::StreamExt;
use log::{ error, info, warn };
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use crate::agents::data::DataAnalyst;
use crate::agents::legal::LegalAgent;
use crate::agents::resume::ResumeOptimizer;
use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig };
use crate::config::tier::TierSettings;
use crate::history::{ format_history_for_prompt, initialize_history_store, HistoryStore };
use crate::llm::chat::{ create_streaming_response, new_client as new_chat_client, ChatClient, TokenStream };
use crate::llm::embedding::new_client as new_embedding_client;
use crate::llm::{ LlmConfig, LlmType };
use crate::models::chat::MessageContent;
use crate::rag::{ RagEngine, VectorIndex };
use crate::router::{ route_query, Department };

/// One completed chat exchange.
#[derive(Debug)]
pub struct ChatTurn {
    pub session_id: i64,
    pub department: Department,
    pub content: MessageContent,
}

pub struct AgencyAgent {
    manager_client: Arc<dyn ChatClient>,
    chat_client: Arc<dyn ChatClient>,
    legal: LegalAgent,
    data_analyst: DataAnalyst,
    resume_optimizer: ResumeOptimizer,
    history_store: Arc<dyn HistoryStore>,
    prompt_config: Arc<PromptConfig>,
    tier: TierSettings,
    history_prompt_limit: usize,
}

impl AgencyAgent {
    fn chat_config(args: &Args, llm_type: &LlmType, model: &str) -> LlmConfig {
        LlmConfig {
            llm_type: llm_type.clone(),
            api_key: Some(args.chat_api_key.clone()).filter(|k| !k.is_empty()),
            completion_model: Some(model.to_string()),
            embedding_model: None,
            base_url: Some(args.chat_base_url.clone()),
        }
    }

    pub async fn new(args: Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let tier = TierSettings::resolve(&args).map_err(Box::<dyn Error + Send + Sync>::from)?;
        info!("Active tier: {} ({})", args.tier, tier.system_name);

        let chat_llm_type: LlmType = args.chat_llm_type.parse()?;
        let manager_client = new_chat_client(
            &Self::chat_config(&args, &chat_llm_type, &tier.manager_model)
        )?;
        let chat_client = new_chat_client(
            &Self::chat_config(&args, &chat_llm_type, &tier.chat_model)
        )?;
        let data_client = new_chat_client(
            &Self::chat_config(&args, &chat_llm_type, &tier.data_model)
        )?;
        let resume_client = new_chat_client(
            &Self::chat_config(&args, &chat_llm_type, &tier.resume_model)
        )?;
        info!(
            "Department models: manager={}, chat={}, data={}, resume={}",
            tier.manager_model,
            tier.chat_model,
            tier.data_model,
            tier.resume_model
        );

        let embedding_llm_type: LlmType = args.embedding_llm_type.parse()?;
        let embedding_config = LlmConfig {
            llm_type: embedding_llm_type,
            api_key: Some(args.embedding_api_key.clone()).filter(|k| !k.is_empty()),
            completion_model: None,
            embedding_model: Some(args.embedding_model.clone()),
            base_url: args.embedding_base_url.clone().or_else(|| Some(args.chat_base_url.clone())),
        };
        let embedding_client = new_embedding_client(&embedding_config)?;

        let index = Arc::new(
            VectorIndex::new(
                &args.qdrant_url,
                args.qdrant_api_key.clone(),
                &args.collection,
                args.dimension
            )?
        );
        if let Err(e) = index.ensure_collection().await {
            warn!("Vector store unavailable at startup: {}", e);
        }
        let rag = Arc::new(
            RagEngine::new(
                index,
                Arc::clone(&chat_client),
                Arc::clone(&embedding_client),
                args.rag_limit
            )
        );

        let legal = LegalAgent::new(rag);
        let data_analyst = DataAnalyst::new(
            Arc::clone(&data_client),
            &args.python_bin,
            &args.charts_dir
        );
        let resume_optimizer = ResumeOptimizer::new(Arc::clone(&resume_client));

        let history_store = initialize_history_store(&args)?;
        let prompt_config = prompt::load_prompts(&args.prompts_path)?;

        Ok(Self {
            manager_client,
            chat_client,
            legal,
            data_analyst,
            resume_optimizer,
            history_store,
            prompt_config,
            tier,
            history_prompt_limit: args.history_prompt_limit,
        })
    }

    pub fn system_name(&self) -> &str {
        &self.tier.system_name
    }

    pub fn history(&self) -> Arc<dyn HistoryStore> {
        Arc::clone(&self.history_store)
    }

    async fn resolve_session(
        &self,
        session_id: Option<i64>,
        message: &str
    ) -> Result<i64, Box<dyn Error + Send + Sync>> {
        match session_id {
            Some(id) => Ok(id),
            None => {
                let id = self.history_store.create_session(message).await?;
                info!("Created session {} for new conversation", id);
                Ok(id)
            }
        }
    }

    /// Why the data department cannot take this request, if it can't.
    fn data_gate(tier: &TierSettings, dataset: Option<&Path>) -> Option<String> {
        if !tier.allow_data_analysis {
            return Some(format!("Data analysis is not available on {}.", tier.system_name));
        }
        if dataset.is_none() {
            return Some(
                "Please provide a CSV dataset to use the data department.".to_string()
            );
        }
        None
    }

    async fn run_data_department(
        &self,
        message: &str,
        dataset: Option<&Path>
    ) -> MessageContent {
        let dataset = match (Self::data_gate(&self.tier, dataset), dataset) {
            (Some(reason), _) => {
                return MessageContent::text(reason);
            }
            (None, Some(dataset)) => dataset,
            (None, None) => unreachable!("gate rejects missing datasets"),
        };

        match self.data_analyst.analyze(&self.prompt_config, dataset, message).await {
            Ok(result) =>
                match result.chart {
                    Some(chart) =>
                        MessageContent::Image {
                            path: chart.to_string_lossy().to_string(),
                            text: result.stdout,
                        },
                    None if result.stdout.is_empty() =>
                        MessageContent::text(
                            "The generated code ran but printed nothing and saved no chart."
                        ),
                    None => MessageContent::text(result.stdout),
                }
            Err(e) => {
                error!("Data department failure: {}", e);
                MessageContent::text(format!("Data department error: {}", e))
            }
        }
    }

    async fn build_general_prompt(&self, session_id: i64, message: &str) -> String {
        let history_str = match
            self.history_store.get_conversation(session_id, self.history_prompt_limit).await
        {
            Ok(conversation) => format_history_for_prompt(&conversation),
            Err(e) => {
                warn!("History read failed, continuing without context: {}", e);
                String::new()
            }
        };
        if history_str.is_empty() {
            message.to_string()
        } else {
            format!("{}\nUser: {}", history_str, message)
        }
    }

    async fn dispatch(
        &self,
        department: Department,
        session_id: i64,
        message: &str,
        dataset: Option<&Path>
    ) -> MessageContent {
        match department {
            Department::Legal =>
                match self.legal.answer(&self.prompt_config, message).await {
                    Ok(answer) => MessageContent::text(answer),
                    Err(e) => {
                        error!("Legal department failure: {}", e);
                        MessageContent::text(format!("Legal department error: {}", e))
                    }
                }
            Department::Data => self.run_data_department(message, dataset).await,
            Department::General => {
                let general_prompt = self.build_general_prompt(session_id, message).await;
                match self.chat_client.complete(&general_prompt).await {
                    Ok(resp) => MessageContent::text(resp.response),
                    Err(e) => {
                        error!("General chat failure: {}", e);
                        MessageContent::text(format!("Chat error: {}", e))
                    }
                }
            }
        }
    }

    /// Full request cycle: resolve the session, route, dispatch, persist
    /// both sides of the exchange. Department failures become user-facing
    /// text; only history-store failures surface as errors.
    pub async fn process_message(
        &self,
        session_id: Option<i64>,
        message: &str,
        dataset: Option<&Path>
    ) -> Result<ChatTurn, Box<dyn Error + Send + Sync>> {
        let session_id = self.resolve_session(session_id, message).await?;
        let department = route_query(
            self.manager_client.as_ref(),
            &self.prompt_config,
            message
        ).await;

        let content = self.dispatch(department, session_id, message, dataset).await;

        self.history_store.add_message(session_id, "user", &MessageContent::text(message)).await?;
        self.history_store.add_message(session_id, "assistant", &content).await?;

        Ok(ChatTurn { session_id, department, content })
    }

    /// Streaming variant. Legal and general answers stream token by token;
    /// data results are computed in full and delivered as one chunk. The
    /// exchange is persisted once the stream is drained.
    pub async fn process_message_stream(
        &self,
        session_id: Option<i64>,
        message: &str,
        dataset: Option<&Path>
    ) -> Result<(i64, Department, TokenStream), Box<dyn Error + Send + Sync>> {
        let session_id = self.resolve_session(session_id, message).await?;
        let department = route_query(
            self.manager_client.as_ref(),
            &self.prompt_config,
            message
        ).await;

        let stream = match department {
            Department::Data => {
                let content = self.run_data_department(message, dataset).await;
                self.history_store.add_message(
                    session_id,
                    "user",
                    &MessageContent::text(message)
                ).await?;
                self.history_store.add_message(session_id, "assistant", &content).await?;
                let rendered = content.as_prompt_text();
                crate::llm::chat::full_response_as_stream(move || async move { Ok(rendered) })?
            }
            Department::Legal | Department::General => {
                let final_prompt = match department {
                    Department::Legal =>
                        match self.legal.build_prompt(&self.prompt_config, message).await {
                            Ok(p) => p,
                            Err(e) => {
                                error!("Legal department failure: {}", e);
                                let text = format!("Legal department error: {}", e);
                                return Ok((
                                    session_id,
                                    department,
                                    self.persisted_error_stream(session_id, message, text).await?,
                                ));
                            }
                        }
                    _ => self.build_general_prompt(session_id, message).await,
                };

                match self.chat_client.complete_stream(&final_prompt).await {
                    Ok(upstream) =>
                        self.persist_after_stream(upstream, session_id, message.to_string())?,
                    Err(e) => {
                        error!("Streaming completion failed: {}", e);
                        let text = format!("Chat error: {}", e);
                        self.persisted_error_stream(session_id, message, text).await?
                    }
                }
            }
        };

        Ok((session_id, department, stream))
    }

    async fn persisted_error_stream(
        &self,
        session_id: i64,
        message: &str,
        text: String
    ) -> Result<TokenStream, Box<dyn Error + Send + Sync>> {
        self.history_store.add_message(session_id, "user", &MessageContent::text(message)).await?;
        self.history_store.add_message(
            session_id,
            "assistant",
            &MessageContent::text(text.clone())
        ).await?;
        crate::llm::chat::full_response_as_stream(move || async move { Ok(text) })
    }

    /// Forwards upstream chunks to the client while accumulating the full
    /// reply, then writes both messages to the history store.
    fn persist_after_stream(
        &self,
        upstream: TokenStream,
        session_id: i64,
        user_message: String
    ) -> Result<TokenStream, Box<dyn Error + Send + Sync>> {
        let history = Arc::clone(&self.history_store);
        create_streaming_response(move |tx| async move {
            let mut upstream = upstream;
            let mut full_reply = String::new();

            while let Some(item) = upstream.next().await {
                match item {
                    Ok(chunk) => {
                        full_reply.push_str(&chunk);
                        if tx.send(Ok(chunk)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let text = format!("Chat error: {}", e);
                        full_reply.push_str(&text);
                        let _ = tx.send(Ok(text)).await;
                        break;
                    }
                }
            }

            if
                let Err(e) = history.add_message(
                    session_id,
                    "user",
                    &MessageContent::text(&user_message)
                ).await
            {
                warn!("History write (user) failed: {}", e);
            }
            if
                let Err(e) = history.add_message(
                    session_id,
                    "assistant",
                    &MessageContent::text(full_reply)
                ).await
            {
                warn!("History write (assistant) failed: {}", e);
            }
        })
    }

    /// Resume optimization sits outside the router; failures collapse to a
    /// user-facing string like every other department.
    pub async fn optimize_resume(&self, resume_text: &str, job_description: &str) -> String {
        match
            self.resume_optimizer.optimize(&self.prompt_config, resume_text, job_description).await
        {
            Ok(optimized) => optimized,
            Err(e) => {
                error!("Resume department failure: {}", e);
                format!("Resume department error: {}", e)
            }
        }
    }

    pub fn reload_prompts_if_changed(
        &mut self,
        args: &Args
    ) -> Result<bool, Box<dyn Error + Send + Sync>> {
        match prompt::reload_prompts_if_changed(&args.prompts_path, &self.prompt_config)? {
            Some(new_config) => {
                self.prompt_config = new_config;
                info!("Prompts successfully reloaded");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tier::Tier;

    #[test]
    fn lite_tier_gates_the_data_department() {
        let tier = TierSettings::defaults_for(Tier::Lite);
        let reason = AgencyAgent::data_gate(&tier, Some(Path::new("sales.csv"))).unwrap();
        assert!(reason.contains("not available"));
    }

    #[test]
    fn missing_dataset_gates_the_data_department() {
        let tier = TierSettings::defaults_for(Tier::Pro);
        let reason = AgencyAgent::data_gate(&tier, None).unwrap();
        assert!(reason.contains("CSV dataset"));
    }

    #[test]
    fn pro_tier_with_dataset_passes_the_gate() {
        let tier = TierSettings::defaults_for(Tier::Pro);
        assert!(AgencyAgent::data_gate(&tier, Some(Path::new("sales.csv"))).is_none());
    }
}
