use super::{Embedder, OLLAMA_EMBEDDING};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::env;

pub(crate) const DEFAULT_THRESHOLD: f32 = 0.35;

pub struct OllamaEmbedder {
    client: Client,
    model: String,
    base_url: String,
}

impl OllamaEmbedder {
    pub fn new(model: Option<String>) -> Result<Self> {
        let base_url =
            env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| "http://localhost:11434".to_string());
        Ok(Self {
            client: Client::builder().build()?,
            model: model.unwrap_or_else(|| "nomic-embed-text".to_string()),
            base_url,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn name(&self) -> &str {
        OLLAMA_EMBEDDING
    }

    fn default_threshold(&self) -> f32 {
        DEFAULT_THRESHOLD
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // The Ollama embeddings endpoint takes one prompt per request.
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let resp = self
                .client
                .post(format!(
                    "{}/api/embeddings",
                    self.base_url.trim_end_matches('/')
                ))
                .json(&serde_json::json!({
                    "model": self.model,
                    "prompt": text,
                }))
                .send()
                .await?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(anyhow!("Ollama embeddings failed ({}): {}", status, body));
            }

            let json: serde_json::Value = resp.json().await?;
            let embedding = json["embedding"]
                .as_array()
                .ok_or_else(|| anyhow!("No embedding field in Ollama response"))?
                .iter()
                .filter_map(|v| v.as_f64())
                .map(|f| f as f32)
                .collect::<Vec<f32>>();
            out.push(embedding);
        }
        Ok(out)
    }
}
