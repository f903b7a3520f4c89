use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use log::info;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt template '{0}' not found")]
    TemplateNotFound(String),
    #[error("Department definition '{0}' not found")]
    DepartmentNotFound(String),
    #[error("Prompt file IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Prompt JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Deserialize, Debug, Clone)]
pub struct PromptConfig {
    /// Department label -> description fed to the routing prompt.
    pub departments: HashMap<String, String>,
    pub query_templates: HashMap<String, String>,
    pub response_templates: HashMap<String, String>,
    #[serde(skip)]
    pub last_loaded: Option<SystemTime>,
}

impl PromptConfig {
    fn validate(&self) -> Result<(), PromptError> {
        for label in ["legal", "data", "general"] {
            if !self.departments.contains_key(label) {
                return Err(PromptError::DepartmentNotFound(label.to_string()));
            }
        }
        if !self.query_templates.contains_key("routing") {
            return Err(PromptError::TemplateNotFound("query_templates:routing".to_string()));
        }
        for key in ["legal_answer", "data_code", "resume_optimizer"] {
            if !self.response_templates.contains_key(key) {
                return Err(
                    PromptError::TemplateNotFound(format!("response_templates:{}", key))
                );
            }
        }
        Ok(())
    }
}

pub fn load_prompts(path: &str) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(path)?;
    let mut config: PromptConfig = serde_json::from_str(&file_content)?;
    config.validate()?;
    config.last_loaded = Some(SystemTime::now());
    Ok(Arc::new(config))
}

/// Returns a fresh config when the file on disk was modified after the
/// currently loaded one, otherwise `None`.
pub fn reload_prompts_if_changed<P: AsRef<Path>>(
    path: P,
    current_config: &Arc<PromptConfig>
) -> Result<Option<Arc<PromptConfig>>, PromptError> {
    let metadata = fs::metadata(&path)?;
    let reload_needed = match (metadata.modified().ok(), current_config.last_loaded) {
        (Some(modified), Some(last_loaded)) => modified > last_loaded,
        _ => true,
    };
    if reload_needed {
        info!("Prompts file changed, reloading...");
        let path_str = path.as_ref().to_string_lossy();
        return Ok(Some(load_prompts(&path_str)?));
    }
    Ok(None)
}

fn get_query_template<'a>(config: &'a PromptConfig, key: &str) -> Result<&'a str, PromptError> {
    config.query_templates
        .get(key)
        .map(|s| s.as_str())
        .ok_or_else(|| PromptError::TemplateNotFound(format!("query_templates:{}", key)))
}

fn get_response_template<'a>(config: &'a PromptConfig, key: &str) -> Result<&'a str, PromptError> {
    config.response_templates
        .get(key)
        .map(|s| s.as_str())
        .ok_or_else(|| PromptError::TemplateNotFound(format!("response_templates:{}", key)))
}

pub fn get_routing_prompt(config: &PromptConfig, message: &str) -> Result<String, PromptError> {
    let template = get_query_template(config, "routing")?;

    let mut labels: Vec<&String> = config.departments.keys().collect();
    labels.sort();
    let descriptions = labels
        .iter()
        .map(|name| format!("- '{}': {}", name, config.departments[name.as_str()]))
        .collect::<Vec<_>>()
        .join("\n");

    Ok(
        template
            .replace("{department_descriptions}", &descriptions)
            .replace("{message}", message)
    )
}

pub fn get_legal_prompt(
    config: &PromptConfig,
    context: &str,
    question: &str
) -> Result<String, PromptError> {
    let template = get_response_template(config, "legal_answer")?;
    Ok(template.replace("{context}", context).replace("{question}", question))
}

pub fn get_data_code_prompt(
    config: &PromptConfig,
    schema: &str,
    request: &str,
    chart_path: &str
) -> Result<String, PromptError> {
    let template = get_response_template(config, "data_code")?;
    Ok(
        template
            .replace("{schema}", schema)
            .replace("{request}", request)
            .replace("{chart_path}", chart_path)
    )
}

pub fn get_resume_prompt(
    config: &PromptConfig,
    resume_text: &str,
    job_description: &str
) -> Result<String, PromptError> {
    let template = get_response_template(config, "resume_optimizer")?;
    Ok(
        template
            .replace("{job_description}", job_description)
            .replace("{resume_text}", resume_text)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_config() -> PromptConfig {
        let mut departments = HashMap::new();
        departments.insert("legal".to_string(), "Document questions.".to_string());
        departments.insert("data".to_string(), "CSV analysis.".to_string());
        departments.insert("general".to_string(), "Everything else.".to_string());

        let mut query_templates = HashMap::new();
        query_templates.insert(
            "routing".to_string(),
            "Departments:\n{department_descriptions}\nQuery: {message}".to_string()
        );

        let mut response_templates = HashMap::new();
        response_templates.insert(
            "legal_answer".to_string(),
            "Context: {context} Question: {question}".to_string()
        );
        response_templates.insert(
            "data_code".to_string(),
            "Columns: {schema} Request: {request} Chart: {chart_path}".to_string()
        );
        response_templates.insert(
            "resume_optimizer".to_string(),
            "JD: {job_description} Resume: {resume_text}".to_string()
        );

        PromptConfig {
            departments,
            query_templates,
            response_templates,
            last_loaded: None,
        }
    }

    #[test]
    fn routing_prompt_lists_every_department() {
        let config = sample_config();
        let prompt = get_routing_prompt(&config, "plot my sales").unwrap();
        assert!(prompt.contains("- 'legal': Document questions."));
        assert!(prompt.contains("- 'data': CSV analysis."));
        assert!(prompt.contains("- 'general': Everything else."));
        assert!(prompt.contains("Query: plot my sales"));
    }

    #[test]
    fn templates_substitute_placeholders() {
        let config = sample_config();
        let legal = get_legal_prompt(&config, "CTX", "Q?").unwrap();
        assert_eq!(legal, "Context: CTX Question: Q?");

        let data = get_data_code_prompt(&config, "a, b", "sum a", "out/chart.png").unwrap();
        assert!(data.contains("Columns: a, b"));
        assert!(data.contains("Chart: out/chart.png"));
    }

    #[test]
    fn missing_template_is_reported() {
        let mut config = sample_config();
        config.response_templates.remove("legal_answer");
        let err = get_legal_prompt(&config, "c", "q").unwrap_err();
        assert!(matches!(err, PromptError::TemplateNotFound(_)));
    }

    #[test]
    fn load_rejects_incomplete_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            "{}",
            r#"{"departments":{},"query_templates":{},"response_templates":{}}"#
        ).unwrap();

        let err = load_prompts(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, PromptError::DepartmentNotFound(_)));
    }
}
