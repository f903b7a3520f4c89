use log::{ info, warn };
use regex::Regex;
use std::error::Error as StdError;
use std::fs;
use std::path::{ Path, PathBuf };
use std::sync::{ Arc, OnceLock };
use tokio::process::Command;

use crate::config::prompt::{ self, PromptConfig };
use crate::llm::chat::ChatClient;

pub const CHART_FILE_NAME: &str = "chart.png";

/// Data department: ask the model for pandas code solving the request, then
/// execute it against the dataset with a Python interpreter. There is no
/// sandbox; the generated code runs with the service's own privileges.
pub struct DataAnalyst {
    chat_client: Arc<dyn ChatClient>,
    python_bin: String,
    charts_dir: PathBuf,
}

#[derive(Debug)]
pub struct AnalysisResult {
    pub stdout: String,
    pub chart: Option<PathBuf>,
}

impl DataAnalyst {
    pub fn new(chat_client: Arc<dyn ChatClient>, python_bin: &str, charts_dir: &str) -> Self {
        Self {
            chat_client,
            python_bin: python_bin.to_string(),
            charts_dir: PathBuf::from(charts_dir),
        }
    }

    pub async fn analyze(
        &self,
        config: &PromptConfig,
        dataset: &Path,
        request: &str
    ) -> Result<AnalysisResult, Box<dyn StdError + Send + Sync>> {
        let schema = read_csv_schema(dataset)?;
        fs::create_dir_all(&self.charts_dir)?;

        // Remove any chart left by a previous run so a stale file is never
        // reported as this request's output.
        let chart_path = self.charts_dir.join(CHART_FILE_NAME);
        if chart_path.exists() {
            fs::remove_file(&chart_path)?;
        }

        let chart_path_str = chart_path.to_string_lossy().to_string();
        let code_prompt = prompt::get_data_code_prompt(config, &schema, request, &chart_path_str)?;
        let reply = self.chat_client.complete(&code_prompt).await?;
        let code = extract_code(&reply.response);
        info!("Generated analysis code:\n{}", code);

        let script = build_script(dataset, &code)?;
        let output = Command::new(&self.python_bin)
            .arg("-c")
            .arg(&script)
            .output().await
            .map_err(|e| format!("Failed to launch '{}': {}", self.python_bin, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("Generated code failed: {}", stderr.trim()).into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let chart = if chart_path.exists() { Some(chart_path) } else { None };
        if stdout.is_empty() && chart.is_none() {
            warn!("Generated code ran but printed nothing and saved no chart");
        }

        Ok(AnalysisResult { stdout, chart })
    }
}

/// Pulls Python code out of the model's reply: a fenced ```python block if
/// present, bare fences otherwise, the raw reply as a last resort. Any
/// `plt.show()` call is dropped since the runner is headless.
pub fn extract_code(text: &str) -> String {
    static FENCED: OnceLock<Regex> = OnceLock::new();
    let fenced = FENCED.get_or_init(|| {
        Regex::new(r"(?s)```(?:python)?\s*(.*?)```").unwrap()
    });
    let code = match fenced.captures(text) {
        Some(caps) => caps[1].trim().to_string(),
        None => text.trim().to_string(),
    };
    code.replace("plt.show()", "")
}

/// Column names from the CSV header line, for the code-generation prompt.
pub fn read_csv_schema(path: &Path) -> Result<String, Box<dyn StdError + Send + Sync>> {
    let content = fs
        ::read_to_string(path)
        .map_err(|e| format!("Failed to read dataset '{}': {}", path.display(), e))?;
    let header = content
        .lines()
        .next()
        .ok_or_else(|| format!("Dataset '{}' is empty", path.display()))?;
    let columns: Vec<String> = header
        .split(',')
        .map(|c| c.trim().trim_matches('"').to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if columns.is_empty() {
        return Err(format!("Dataset '{}' has no columns", path.display()).into());
    }
    Ok(columns.join(", "))
}

/// Wraps the generated code in a preamble that loads the dataset into `df`
/// and forces a headless matplotlib backend.
fn build_script(dataset: &Path, code: &str) -> Result<String, Box<dyn StdError + Send + Sync>> {
    // JSON string literals are valid Python string literals.
    let dataset_literal = serde_json::to_string(&dataset.to_string_lossy())?;
    let preamble = concat!(
        "import pandas as pd\n",
        "import matplotlib\n",
        "matplotlib.use('Agg')\n",
        "import matplotlib.pyplot as plt\n",
        "try:\n",
        "    import seaborn as sns\n",
        "except ImportError:\n",
        "    sns = None\n"
    );
    Ok(format!("{}df = pd.read_csv({})\n{}\n", preamble, dataset_literal, code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io::Write;
    use crate::llm::chat::CompletionResponse;

    #[test]
    fn fenced_python_block_is_extracted() {
        let reply = "Here you go:\n```python\nprint(df.sum())\n```\nHope it helps.";
        assert_eq!(extract_code(reply), "print(df.sum())");
    }

    #[test]
    fn bare_fences_are_extracted() {
        let reply = "```\ntotal = df['sales'].sum()\nprint(total)\n```";
        assert_eq!(extract_code(reply), "total = df['sales'].sum()\nprint(total)");
    }

    #[test]
    fn unfenced_reply_passes_through() {
        assert_eq!(extract_code("print(len(df))"), "print(len(df))");
    }

    #[test]
    fn plt_show_is_stripped() {
        let reply = "```python\nplt.plot(df['x'])\nplt.show()\nplt.savefig('c.png')\n```";
        let code = extract_code(reply);
        assert!(!code.contains("plt.show()"));
        assert!(code.contains("plt.savefig"));
    }

    #[test]
    fn csv_schema_reads_header_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "region,\"month\",sales").unwrap();
        writeln!(file, "north,jan,100").unwrap();

        let schema = read_csv_schema(&path).unwrap();
        assert_eq!(schema, "region, month, sales");
    }

    #[test]
    fn empty_csv_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::File::create(&path).unwrap();
        assert!(read_csv_schema(&path).is_err());
    }

    struct CodeReplyClient;

    #[async_trait]
    impl ChatClient for CodeReplyClient {
        async fn complete(
            &self,
            _prompt: &str
        ) -> Result<CompletionResponse, Box<dyn std::error::Error + Send + Sync>> {
            Ok(CompletionResponse {
                response: "```python\nprint(len(df))\n```".to_string(),
            })
        }
    }

    fn analyst_config() -> crate::config::prompt::PromptConfig {
        let mut response_templates = HashMap::new();
        response_templates.insert(
            "data_code".to_string(),
            "Columns: {schema} Request: {request} Chart: {chart_path}".to_string()
        );
        crate::config::prompt::PromptConfig {
            departments: HashMap::new(),
            query_templates: HashMap::new(),
            response_templates,
            last_loaded: None,
        }
    }

    #[tokio::test]
    async fn missing_interpreter_surfaces_as_error_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("data.csv");
        let mut file = std::fs::File::create(&dataset).unwrap();
        writeln!(file, "a,b").unwrap();
        writeln!(file, "1,2").unwrap();

        let analyst = DataAnalyst::new(
            Arc::new(CodeReplyClient),
            "/nonexistent/python-interpreter",
            dir.path().join("charts").to_str().unwrap()
        );
        let config = analyst_config();
        let err = analyst.analyze(&config, &dataset, "count rows").await.unwrap_err();
        assert!(err.to_string().contains("Failed to launch"));
    }
}
