use crate::prompts;
use docret_core::llm::{json_repair, LlmClient};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

/// Secondary LLM judgement of how relevant one chunk is to a query.
/// A failed call or unparseable reply scores 0 with `error` set; tokens are
/// still counted for calls that completed.
#[derive(Debug, Clone, Default)]
pub struct RelevanceScore {
    pub score: f32,
    pub explanation: Option<String>,
    pub tokens_used: usize,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RelevanceReply {
    score: f32,
    explanation: Option<String>,
}

/// One LLM round-trip per chunk, sequential. Per-chunk faults are isolated:
/// one bad chunk never aborts the batch.
pub struct RelevanceScorer {
    llm: Arc<dyn LlmClient>,
}

impl RelevanceScorer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn score(&self, query: &str, content: &str) -> RelevanceScore {
        let prompt = prompts::RELEVANCE_TEMPLATE
            .replace("{query}", query)
            .replace("{content}", content);

        let completion = match self.llm.complete(&prompt).await {
            Ok(completion) => completion,
            Err(err) => {
                warn!("relevance call failed: {}", err);
                return RelevanceScore {
                    error: Some(err.to_string()),
                    ..Default::default()
                };
            }
        };

        match json_repair::parse_llm_json::<RelevanceReply>(&completion.text) {
            Ok(reply) => RelevanceScore {
                score: reply.score,
                explanation: reply.explanation,
                tokens_used: completion.tokens_used,
                error: None,
            },
            Err(err) => {
                warn!("relevance reply unparseable: {}", err);
                RelevanceScore {
                    score: 0.0,
                    explanation: None,
                    tokens_used: completion.tokens_used,
                    error: Some(err.to_string()),
                }
            }
        }
    }
}
