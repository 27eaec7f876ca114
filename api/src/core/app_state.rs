//! Shared application state, built once at startup from [`super::config::AppConfig`]
//! and handed to every handler behind an `Arc`.

use std::sync::Arc;

use ai_llm_service::{LlmServiceProfiles, ReviewAnalyzer};
use mr_reviewer::git_providers::ProviderConfig;
use mr_reviewer::IdempotencyCache;
use rag_store::embed::openai::{OpenAiEmbedder, OpenAiEmbedderConfig};
use rag_store::gateway::PersistenceGateway;

use super::config::{AppConfig, ConfigError};

pub struct AppState {
    pub trigger_secret: String,
    pub git: ProviderConfig,
    pub gateway: PersistenceGateway,
    pub embedder: OpenAiEmbedder,
    pub analyzer: ReviewAnalyzer,
    pub idempotency: IdempotencyCache,
    pub max_comments_per_file: usize,
}

impl AppState {
    pub fn new(cfg: &AppConfig) -> Result<Self, ConfigError> {
        let gateway = PersistenceGateway::new(&cfg.rag)?;

        let embedder = OpenAiEmbedder::new(OpenAiEmbedderConfig {
            api_key: cfg.openai_api_key.clone(),
            ..Default::default()
        });

        let llm = Arc::new(LlmServiceProfiles::new(
            cfg.fast_llm.clone(),
            cfg.slow_llm.clone(),
            cfg.embedding_llm.clone(),
            None,
        )?);
        let analyzer = ReviewAnalyzer::new(llm);

        let git = ProviderConfig {
            kind: cfg.git.kind,
            base_api: cfg.git.base_api.clone(),
            token: cfg.git.token.clone(),
        };

        Ok(Self {
            trigger_secret: cfg.trigger_secret.clone(),
            git,
            gateway,
            embedder,
            analyzer,
            idempotency: IdempotencyCache::new(),
            max_comments_per_file: cfg.max_comments_per_file,
        })
    }
}
