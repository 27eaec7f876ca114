//! Strict environment-backed configuration. Absent required variables
//! prevent startup rather than falling back to silent defaults.

use thiserror::Error;

use ai_llm_service::config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider};
use mr_reviewer::git_providers::ProviderKind;
use rag_store::RagConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: &'static str },

    #[error("database configuration error: {0}")]
    Rag(#[from] rag_store::RagError),

    #[error("llm service configuration error: {0}")]
    Llm(#[from] ai_llm_service::error_handler::AiLlmError),
}

#[derive(Debug, Clone)]
pub struct GitProviderConfig {
    pub kind: ProviderKind,
    pub base_api: String,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub trigger_secret: String,
    pub git: GitProviderConfig,
    pub rag: RagConfig,
    pub openai_api_key: String,
    pub fast_llm: LlmModelConfig,
    pub slow_llm: Option<LlmModelConfig>,
    pub embedding_llm: LlmModelConfig,
    pub max_comments_per_file: usize,
}

fn must_env(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingVar(var))
}

fn provider_kind_from_env() -> Result<ProviderKind, ConfigError> {
    match must_env("GIT_PROVIDER")?.to_lowercase().as_str() {
        "gitlab" => Ok(ProviderKind::GitLab),
        "github" => Ok(ProviderKind::GitHub),
        "bitbucket" => Ok(ProviderKind::Bitbucket),
        _ => Err(ConfigError::InvalidValue {
            var: "GIT_PROVIDER",
            reason: "expected one of gitlab|github|bitbucket",
        }),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(8080);

        let trigger_secret = must_env("TRIGGER_SECRET")?;

        let git = GitProviderConfig {
            kind: provider_kind_from_env()?,
            base_api: must_env("GIT_API_BASE")?,
            token: must_env("GIT_TOKEN")?,
        };

        let rag = RagConfig::from_env()?;

        let openai_api_key = must_env("OPENAI_API_KEY")?;

        let fast_llm = LlmModelConfig {
            provider: LlmProvider::OpenAI,
            model: std::env::var("LLM_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: Some(openai_api_key.clone()),
            max_tokens: None,
            temperature: Some(0.2),
            top_p: None,
            timeout_secs: Some(60),
        };

        let embedding_llm = LlmModelConfig {
            provider: LlmProvider::OpenAI,
            model: rag_store::embed::openai::DEFAULT_MODEL.to_string(),
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: Some(openai_api_key.clone()),
            max_tokens: None,
            temperature: Some(0.0),
            top_p: None,
            timeout_secs: Some(30),
        };

        let max_comments_per_file = std::env::var("MAX_COMMENTS_PER_FILE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(10);

        Ok(Self {
            port,
            trigger_secret,
            git,
            rag,
            openai_api_key,
            fast_llm,
            slow_llm: None,
            embedding_llm,
            max_comments_per_file,
        })
    }
}
