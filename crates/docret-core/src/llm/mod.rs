use anyhow::Result;
use async_trait::async_trait;

pub mod json_repair;
pub mod openai;

pub use openai::OpenAiChat;

/// One completion round-trip: the text plus the tokens the server charged
/// for it (0 when the server reports no usage).
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    pub tokens_used: usize,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<Completion>;
}
