use anyhow::Result;
use tiktoken_rs::{cl100k_base, get_bpe_from_model, CoreBPE};

/// Resolve the tokenizer for a model name, falling back to cl100k_base for
/// models tiktoken does not know about.
pub fn encoding_for_model(model_name: &str) -> Result<CoreBPE> {
    get_bpe_from_model(model_name).or_else(|_| cl100k_base())
}
