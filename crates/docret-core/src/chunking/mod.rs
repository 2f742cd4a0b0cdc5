use crate::models::{Chunk, DocumentInput, IndexParams, SplitterMode, OFFSET_KEY};
use anyhow::Result;

pub mod fact_list;
pub mod faq;
pub mod token;
pub mod tokenizer;

pub use fact_list::FactListSplitter;
pub use faq::FaqSplitter;
pub use token::TokenSplitter;

/// The three splitting strategies behind one tagged union. The mode is
/// resolved once at construction; invalid parameters are rejected here,
/// before any I/O.
pub enum Splitter {
    Token(TokenSplitter),
    FactList(FactListSplitter),
    Faq(FaqSplitter),
}

impl Splitter {
    pub fn for_params(params: &IndexParams, fact_separator: &str) -> Result<Self> {
        params.validate()?;
        Ok(match params.splitter_mode {
            SplitterMode::Token => Splitter::Token(TokenSplitter::new(params)?),
            SplitterMode::FactList => Splitter::FactList(FactListSplitter::new(fact_separator)),
            SplitterMode::Faq => Splitter::Faq(FaqSplitter::new()),
        })
    }

    /// Split every document independently; one document never aborts the
    /// batch.
    pub fn split(&self, inputs: &[DocumentInput]) -> Vec<Chunk> {
        match self {
            Splitter::Token(s) => s.split(inputs),
            Splitter::FactList(s) => s.split(inputs),
            Splitter::Faq(s) => s.split(inputs),
        }
    }
}

/// Attach provenance to split pieces: each chunk gets a deep copy of the
/// document metadata plus its recovered offset. Recovery is a forward
/// substring search starting one character past the previous hit — decode
/// output is not guaranteed byte-identical to the source, so a miss is
/// recorded as `-1` rather than an error.
pub(crate) fn with_offsets(source: &DocumentInput, pieces: Vec<String>) -> Vec<Chunk> {
    let mut chunks = Vec::with_capacity(pieces.len());
    let mut search_from = 0usize;
    for piece in pieces {
        let found = source
            .text
            .get(search_from..)
            .and_then(|rest| rest.find(&piece))
            .map(|rel| search_from + rel);
        if let Some(offset) = found {
            let step = source.text[offset..]
                .chars()
                .next()
                .map(|c| c.len_utf8())
                .unwrap_or(1);
            search_from = offset + step;
        }
        let mut metadata = source.metadata.clone();
        metadata.insert(
            OFFSET_KEY.to_string(),
            found.map(|o| o.to_string()).unwrap_or_else(|| "-1".to_string()),
        );
        chunks.push(Chunk::new(piece, metadata));
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    #[test]
    fn offsets_advance_forward_only() {
        let doc = DocumentInput::new("abc abc abc", Metadata::new());
        let chunks = with_offsets(&doc, vec!["abc".into(), "abc".into(), "abc".into()]);
        let offsets: Vec<i64> = chunks.iter().map(|c| c.offset().unwrap()).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
    }

    #[test]
    fn unmatched_piece_gets_sentinel_offset() {
        let doc = DocumentInput::new("only this text", Metadata::new());
        let chunks = with_offsets(&doc, vec!["only".into(), "missing".into(), "text".into()]);
        assert_eq!(chunks[0].offset(), Some(0));
        assert_eq!(chunks[1].offset(), Some(-1));
        assert_eq!(chunks[2].offset(), Some(10));
    }
}
