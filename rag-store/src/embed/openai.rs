//! OpenAI embedding provider implementation (`text-embedding-3-small`).

use crate::{EmbeddingsProvider, RagError};
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Configuration for the OpenAI embedding backend.
#[derive(Clone, Debug)]
pub struct OpenAiEmbedderConfig {
    pub api_key: String,
    /// Defaults to `https://api.openai.com/v1`.
    pub base_url: String,
    pub model: String,
}

impl Default for OpenAiEmbedderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(cfg: OpenAiEmbedderConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: cfg.api_key,
            base_url: cfg.base_url,
            model: cfg.model,
        }
    }
}

impl EmbeddingsProvider for OpenAiEmbedder {
    fn embed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<f32>, RagError>> + Send + 'a>>
    {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Request<'a> {
                model: &'a str,
                input: &'a str,
            }

            #[derive(Deserialize)]
            struct Embedding {
                embedding: Vec<f32>,
            }

            #[derive(Deserialize)]
            struct Response {
                data: Vec<Embedding>,
            }

            let req = Request {
                model: &self.model,
                input: text,
            };

            let resp = self
                .client
                .post(format!("{}/embeddings", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .map_err(|e| RagError::Provider(format!("OpenAI request failed: {e}")))?
                .error_for_status()
                .map_err(|e| RagError::Provider(format!("OpenAI HTTP error: {e}")))?;

            let mut parsed: Response = resp
                .json()
                .await
                .map_err(|e| RagError::Provider(format!("OpenAI JSON parse failed: {e}")))?;

            parsed
                .data
                .pop()
                .map(|e| e.embedding)
                .ok_or_else(|| RagError::Provider("OpenAI response had no embedding data".into()))
        })
    }
}
