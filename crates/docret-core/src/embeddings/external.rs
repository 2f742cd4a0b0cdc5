use super::{Embedder, OPENAI_EMBEDDING};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::env;

pub(crate) const DEFAULT_THRESHOLD: f32 = 0.76;

pub struct ExternalEmbedder {
    client: Client,
    api_key: String,
    model: String,
}

impl ExternalEmbedder {
    pub fn new(model: Option<String>) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            client: Client::new(),
            api_key,
            model: model.unwrap_or_else(|| "text-embedding-3-small".to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingResponse {
    data: Vec<OpenAIEmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct OpenAIEmbeddingItem {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for ExternalEmbedder {
    fn name(&self) -> &str {
        OPENAI_EMBEDDING
    }

    fn default_threshold(&self) -> f32 {
        DEFAULT_THRESHOLD
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let resp = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("OpenAI embeddings failed ({}): {}", status, body));
        }

        let parsed: OpenAIEmbeddingResponse = resp.json().await?;
        if parsed.data.len() != texts.len() {
            return Err(anyhow!(
                "Mismatch embedding count: got {}, expected {}",
                parsed.data.len(),
                texts.len()
            ));
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}
