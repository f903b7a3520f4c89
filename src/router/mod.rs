use log::{ error, info };
use serde::{ Deserialize, Serialize };
use std::fmt;

use crate::config::prompt::{ self, PromptConfig };
use crate::llm::chat::ChatClient;

/// The three fixed routing labels. Anything the manager model says that does
/// not clearly name a department collapses to `General`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Department {
    Legal,
    Data,
    General,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Legal => "legal",
            Department::Data => "data",
            Department::General => "general",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Matches a raw model reply against the three labels. Substring match on
/// the lowercased reply, so "'legal'." or "Route to legal" both work.
pub fn parse_department(reply: &str) -> Department {
    let decision = reply.trim().to_lowercase();
    if decision.contains("legal") {
        return Department::Legal;
    }
    if decision.contains("data") {
        return Department::Data;
    }
    Department::General
}

/// One classification call against the manager model. Any failure, transport
/// or otherwise, falls back to the general department.
pub async fn route_query(
    chat_client: &dyn ChatClient,
    config: &PromptConfig,
    message: &str
) -> Department {
    let routing_prompt = match prompt::get_routing_prompt(config, message) {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to build routing prompt: {}", e);
            return Department::General;
        }
    };

    match chat_client.complete(&routing_prompt).await {
        Ok(resp) => {
            let department = parse_department(&resp.response);
            info!("Routed query to department: {}", department);
            department
        }
        Err(e) => {
            error!("Router error: {}", e);
            Department::General
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::error::Error as StdError;
    use crate::llm::chat::CompletionResponse;

    struct FixedReplyClient(&'static str);

    #[async_trait]
    impl ChatClient for FixedReplyClient {
        async fn complete(
            &self,
            _prompt: &str
        ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
            Ok(CompletionResponse { response: self.0.to_string() })
        }
    }

    struct FailingClient;

    #[async_trait]
    impl ChatClient for FailingClient {
        async fn complete(
            &self,
            _prompt: &str
        ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
            Err("connection refused".into())
        }
    }

    fn routing_config() -> PromptConfig {
        let mut departments = HashMap::new();
        departments.insert("legal".to_string(), "docs".to_string());
        departments.insert("data".to_string(), "csv".to_string());
        departments.insert("general".to_string(), "chat".to_string());
        let mut query_templates = HashMap::new();
        query_templates.insert(
            "routing".to_string(),
            "{department_descriptions} {message}".to_string()
        );
        PromptConfig {
            departments,
            query_templates,
            response_templates: HashMap::new(),
            last_loaded: None,
        }
    }

    #[test]
    fn exact_labels_parse() {
        assert_eq!(parse_department("legal"), Department::Legal);
        assert_eq!(parse_department("data"), Department::Data);
        assert_eq!(parse_department("general"), Department::General);
    }

    #[test]
    fn noisy_replies_still_match() {
        assert_eq!(parse_department("  'Legal'.\n"), Department::Legal);
        assert_eq!(parse_department("I would route this to the data department"), Department::Data);
    }

    #[test]
    fn garbage_falls_back_to_general() {
        assert_eq!(parse_department(""), Department::General);
        assert_eq!(parse_department("accounting"), Department::General);
        assert_eq!(parse_department("42"), Department::General);
    }

    #[tokio::test]
    async fn router_uses_model_reply() {
        let config = routing_config();
        let department = route_query(&FixedReplyClient("data"), &config, "plot sales").await;
        assert_eq!(department, Department::Data);
    }

    #[tokio::test]
    async fn router_falls_back_to_general_on_llm_failure() {
        let config = routing_config();
        let department = route_query(&FailingClient, &config, "anything").await;
        assert_eq!(department, Department::General);
    }
}
