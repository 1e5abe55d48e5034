use std::str::FromStr;

use anyhow::{bail, Context, Result};

/// Which chat-completion backend answers LLM calls.
/// Each variant maps to one `ChatProvider` implementation in `gateway`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenRouter,
    Anthropic,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openrouter" => Ok(ProviderKind::OpenRouter),
            "anthropic" => Ok(ProviderKind::Anthropic),
            other => bail!("Unknown LLM_PROVIDER '{other}' (expected 'openrouter' or 'anthropic')"),
        }
    }
}

/// Application configuration loaded from environment variables.
///
/// API keys are optional at startup: the service boots without them so the
/// knowledge and extraction endpoints stay usable, but any action that needs
/// the gateway is blocked with a configuration error until a key is set.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderKind,
    pub openrouter_api_key: Option<String>,
    pub openrouter_base_url: String,
    pub openrouter_referer: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: String,
    pub default_model: String,
    pub temperature: f32,
    pub langsmith_api_key: Option<String>,
    pub langsmith_endpoint: String,
    pub langsmith_project: String,
    pub knowledge_csv: String,
    pub prompts_path: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            provider: std::env::var("LLM_PROVIDER")
                .unwrap_or_else(|_| "openrouter".to_string())
                .parse()?,
            openrouter_api_key: optional_env("OPENROUTER_API_KEY"),
            openrouter_base_url: std::env::var("OPENROUTER_BASE_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
            openrouter_referer: optional_env("OPENROUTER_REFERER"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            anthropic_base_url: std::env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            default_model: std::env::var("DEFAULT_MODEL")
                .unwrap_or_else(|_| "qwen/qwen-max".to_string()),
            temperature: std::env::var("LLM_TEMPERATURE")
                .unwrap_or_else(|_| "0.7".to_string())
                .parse::<f32>()
                .context("LLM_TEMPERATURE must be a valid float")?,
            langsmith_api_key: optional_env("LANGSMITH_API_KEY"),
            langsmith_endpoint: std::env::var("LANGSMITH_ENDPOINT")
                .unwrap_or_else(|_| "https://api.smith.langchain.com".to_string()),
            langsmith_project: std::env::var("LANGSMITH_PROJECT")
                .unwrap_or_else(|_| "pathlight".to_string()),
            knowledge_csv: std::env::var("KNOWLEDGE_CSV")
                .unwrap_or_else(|_| "knowledge.csv".to_string()),
            prompts_path: std::env::var("PROMPTS_PATH")
                .unwrap_or_else(|_| "prompts/saved_prompts.json".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// The API key for the configured provider, if one was supplied.
    pub fn provider_api_key(&self) -> Option<&str> {
        match self.provider {
            ProviderKind::OpenRouter => self.openrouter_api_key.as_deref(),
            ProviderKind::Anthropic => self.anthropic_api_key.as_deref(),
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
