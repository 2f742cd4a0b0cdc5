use super::{Completion, LlmClient};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::env;

/// Chat client for any OpenAI-compatible endpoint. Defaults to OpenAI when
/// `OPENAI_API_KEY` is set, otherwise to a local Ollama server; both the
/// endpoint and the model can be overridden via `LLM_API_BASE` and
/// `LLM_MODEL`.
pub struct OpenAiChat {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_url: String,
    max_tokens: usize,
}

impl OpenAiChat {
    pub fn new(model: Option<String>, max_tokens: usize) -> Result<Self> {
        let openai_key = env::var("OPENAI_API_KEY").ok();

        let (default_url, default_model, api_key) = if let Some(k) = openai_key {
            ("https://api.openai.com/v1", "gpt-4o-mini", k)
        } else {
            (
                "http://localhost:11434/v1",
                "llama3.2:3b",
                "dummy".to_string(),
            )
        };

        let api_url = env::var("LLM_API_BASE").unwrap_or_else(|_| default_url.to_string());
        let model = model
            .or_else(|| env::var("LLM_MODEL").ok())
            .unwrap_or_else(|| default_model.to_string());

        if api_url.contains("openai.com") && api_key == "dummy" {
            return Err(anyhow!(
                "OPENAI_API_KEY environment variable not set for OpenAI URL"
            ));
        }

        let endpoint = if api_url.ends_with("/chat/completions") {
            api_url
        } else {
            format!("{}/chat/completions", api_url.trim_end_matches('/'))
        };

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            api_url: endpoint,
            max_tokens,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResp {
    choices: Vec<ChatRespChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatRespChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: Option<usize>,
}

#[async_trait]
impl LlmClient for OpenAiChat {
    async fn complete(&self, prompt: &str) -> Result<Completion> {
        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [
                    { "role": "user", "content": prompt }
                ],
                "max_tokens": self.max_tokens,
                "temperature": 0.0
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("LLM error {}: {}", status, body));
        }

        let parsed: ChatResp = resp.json().await?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
            .trim()
            .to_string();
        let tokens_used = parsed.usage.and_then(|u| u.total_tokens).unwrap_or(0);

        Ok(Completion { text, tokens_used })
    }
}
