use super::tokenizer;
use crate::models::{Chunk, DocumentInput, IndexParams};
use anyhow::Result;
use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Token-window splitter: fixed-width windows with overlap over the token
/// sequence, decoded back to text. Window starts advance by
/// `tokens_per_chunk - chunk_overlap_tokens`, which `IndexParams::validate`
/// guarantees is positive, so the loop always terminates.
pub struct TokenSplitter {
    bpe: CoreBPE,
    min_tokens: usize,
    window: usize,
    step: usize,
}

impl TokenSplitter {
    pub fn new(params: &IndexParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            bpe: tokenizer::encoding_for_model(&params.model_name)?,
            min_tokens: params.chunk_min_tokens,
            window: params.tokens_per_chunk,
            step: params.tokens_per_chunk - params.chunk_overlap_tokens,
        })
    }

    fn split_text(&self, text: &str) -> Vec<String> {
        let tokens = self.bpe.encode_with_special_tokens(text);
        let mut pieces = Vec::new();
        let mut start = 0usize;
        while start < tokens.len() {
            let end = usize::min(start + self.window, tokens.len());
            let window = &tokens[start..end];
            // Windows at or below the minimum are dropped: this cuts both
            // the ragged tail and pathologically small windows.
            if window.len() > self.min_tokens {
                match self.bpe.decode(window.to_vec()) {
                    Ok(piece) if !piece.is_empty() => pieces.push(piece),
                    Ok(_) => {}
                    Err(err) => warn!("failed to decode token window at {}: {}", start, err),
                }
            }
            start += self.step;
        }
        pieces
    }

    pub fn split(&self, inputs: &[DocumentInput]) -> Vec<Chunk> {
        inputs
            .iter()
            .flat_map(|doc| super::with_offsets(doc, self.split_text(&doc.text)))
            .collect()
    }
}
