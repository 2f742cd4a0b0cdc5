use crate::prompts;
use docret_core::llm::{json_repair, LlmClient};
use serde::{Deserialize, Deserializer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Literal the seed prompt asks the model to produce when a chunk holds no
/// answer. Treated as "keep looking", not as an error.
pub const NO_ANSWER: &str = "No answer";

/// Outcome of one refine run. `failed` marks a fold aborted by a transport
/// or parse error; `tokens_used` covers every completed LLM call either
/// way, and `steps` is the human-readable trace of the fold.
#[derive(Debug, Clone, Default)]
pub struct RefineAnswerResult {
    pub answer: String,
    pub tokens_used: usize,
    pub failed: bool,
    pub steps: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SeedReply {
    #[serde(default)]
    answer: String,
}

#[derive(Debug, Deserialize)]
struct RefineReply {
    #[serde(deserialize_with = "bool_or_string")]
    not_useful: bool,
    #[serde(default)]
    refined_answer: String,
}

/// The refine prompt asks for "True"/"False" strings and models reply with
/// either those or real booleans; accept both.
fn bool_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Text(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(D::Error::custom(format!("not a boolean: {}", other))),
        },
    }
}

/// Sequential left fold over the ranked chunk list. The seed prompt is
/// issued chunk-by-chunk until the first non-sentinel answer, then the
/// chain switches to pure refinement; a refinement is only accepted when
/// the model explicitly marks the new context useful. Inherently
/// sequential — each step depends on the previous answer.
pub struct RefineAnswerChain {
    llm: Arc<dyn LlmClient>,
}

enum StepOutcome {
    /// Parsed reply proposing a replacement answer.
    Replace(String),
    /// Parsed reply keeping the current answer.
    Keep,
}

impl RefineAnswerChain {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    fn is_no_answer(answer: &str) -> bool {
        let trimmed = answer.trim();
        trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NO_ANSWER)
    }

    /// Fold the chunks into one answer. `cancel` is checked before each
    /// chunk's LLM call; cancelling stops the fold cleanly and keeps the
    /// token accounting of completed steps.
    pub async fn run(
        &self,
        question: &str,
        chunks: &[String],
        cancel: Option<&AtomicBool>,
    ) -> RefineAnswerResult {
        let mut answer = NO_ANSWER.to_string();
        let mut tokens_used = 0usize;
        let mut steps = Vec::new();
        let mut seeded = false;

        for (index, chunk) in chunks.iter().enumerate() {
            if let Some(flag) = cancel {
                if flag.load(Ordering::Relaxed) {
                    steps.push(format!("Cancelled before chunk #{}", index + 1));
                    break;
                }
            }
            steps.push(format!("Process chunk #{}", index + 1));

            let prompt = if !seeded {
                prompts::ANSWER_SEED_TEMPLATE
                    .replace("{question}", question)
                    .replace("{text}", chunk)
            } else {
                prompts::ANSWER_REFINE_TEMPLATE
                    .replace("{question}", question)
                    .replace("{existing_answer}", &answer)
                    .replace("{more_context}", chunk)
            };

            // A corrupt step is not trusted to silently continue: any
            // transport or parse failure aborts the whole fold.
            let completion = match self.llm.complete(&prompt).await {
                Ok(completion) => completion,
                Err(err) => {
                    steps.push(format!("Error: {}", err));
                    return RefineAnswerResult {
                        answer,
                        tokens_used,
                        failed: true,
                        steps,
                    };
                }
            };
            tokens_used += completion.tokens_used;
            steps.push(completion.text.clone());

            let outcome = if !seeded {
                json_repair::parse_llm_json::<SeedReply>(&completion.text)
                    .map(|reply| StepOutcome::Replace(reply.answer))
            } else {
                json_repair::parse_llm_json::<RefineReply>(&completion.text).map(|reply| {
                    if reply.not_useful {
                        StepOutcome::Keep
                    } else {
                        StepOutcome::Replace(reply.refined_answer)
                    }
                })
            };

            match outcome {
                Ok(StepOutcome::Replace(new_answer)) if !seeded => {
                    if Self::is_no_answer(&new_answer) {
                        answer = NO_ANSWER.to_string();
                    } else {
                        answer = new_answer;
                        seeded = true;
                    }
                }
                Ok(StepOutcome::Replace(new_answer)) => answer = new_answer,
                Ok(StepOutcome::Keep) => {}
                Err(err) => {
                    steps.push(format!("Error: {}", err));
                    return RefineAnswerResult {
                        answer,
                        tokens_used,
                        failed: true,
                        steps,
                    };
                }
            }
        }

        RefineAnswerResult {
            answer,
            tokens_used,
            failed: false,
            steps,
        }
    }
}
