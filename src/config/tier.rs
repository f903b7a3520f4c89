use std::fmt;
use std::str::FromStr;

use serde::{ Deserialize, Serialize };

use crate::cli::Args;

/// Deployment tier. Lite runs every department on a single small model and
/// keeps the data department (arbitrary code execution) switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Lite,
    Pro,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Lite => write!(f, "lite"),
            Tier::Pro => write!(f, "pro"),
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "lite" => Ok(Tier::Lite),
            "pro" => Ok(Tier::Pro),
            other => Err(format!("Unsupported tier: '{}'", other)),
        }
    }
}

/// Resolved per-department model assignment.
#[derive(Debug, Clone)]
pub struct TierSettings {
    pub system_name: String,
    pub manager_model: String,
    pub chat_model: String,
    pub data_model: String,
    pub resume_model: String,
    pub allow_data_analysis: bool,
}

impl TierSettings {
    pub fn defaults_for(tier: Tier) -> Self {
        match tier {
            Tier::Lite =>
                Self {
                    system_name: "AI Agency LITE".to_string(),
                    manager_model: "llama3.1".to_string(),
                    chat_model: "llama3.1".to_string(),
                    data_model: "llama3.1".to_string(),
                    resume_model: "llama3.1".to_string(),
                    allow_data_analysis: false,
                },
            Tier::Pro =>
                Self {
                    system_name: "AI Agency PRO (Sovereign Edition)".to_string(),
                    manager_model: "qwen2.5-coder:32b".to_string(),
                    chat_model: "llama3.1".to_string(),
                    data_model: "qwen2.5-coder:32b".to_string(),
                    resume_model: "gemma2:9b".to_string(),
                    allow_data_analysis: true,
                },
        }
    }

    /// Tier defaults with any explicit model overrides from the CLI applied.
    pub fn resolve(args: &Args) -> Result<Self, String> {
        let tier: Tier = args.tier.parse()?;
        let mut settings = Self::defaults_for(tier);
        if let Some(model) = &args.manager_model {
            settings.manager_model = model.clone();
        }
        if let Some(model) = &args.chat_model {
            settings.chat_model = model.clone();
        }
        if let Some(model) = &args.data_model {
            settings.data_model = model.clone();
        }
        if let Some(model) = &args.resume_model {
            settings.resume_model = model.clone();
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn lite_tier_disables_data_analysis() {
        let settings = TierSettings::defaults_for(Tier::Lite);
        assert!(!settings.allow_data_analysis);
        assert_eq!(settings.data_model, "llama3.1");
    }

    #[test]
    fn cli_override_beats_tier_default() {
        let args = Args::parse_from([
            "agency-manager",
            "--tier",
            "pro",
            "--resume-model",
            "mistral:7b",
        ]);
        let settings = TierSettings::resolve(&args).unwrap();
        assert_eq!(settings.resume_model, "mistral:7b");
        assert_eq!(settings.manager_model, "qwen2.5-coder:32b");
        assert!(settings.allow_data_analysis);
    }

    #[test]
    fn unknown_tier_is_rejected() {
        assert!("enterprise".parse::<Tier>().is_err());
    }
}
