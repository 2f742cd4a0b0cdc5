use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// String-keyed provenance metadata carried from document to chunk.
pub type Metadata = BTreeMap<String, String>;

/// Metadata key for the source document name.
pub const SOURCE_KEY: &str = "p_source";
/// Metadata key injected on every chunk: byte offset of the chunk content
/// inside the source text, `-1` when recovery failed.
pub const OFFSET_KEY: &str = "offset";

/// Extracted plain text of one source document. Immutable once handed to a
/// splitter; parsing happens upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInput {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl DocumentInput {
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    pub fn from_source(text: impl Into<String>, source: &str) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_KEY.to_string(), source.to_string());
        Self::new(text, metadata)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SplitterMode {
    Token,
    FactList,
    Faq,
}

impl std::str::FromStr for SplitterMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "token" => Ok(SplitterMode::Token),
            "factlist" | "fact-list" | "facts" => Ok(SplitterMode::FactList),
            "faq" => Ok(SplitterMode::Faq),
            other => bail!("unknown splitter mode '{}'", other),
        }
    }
}

impl std::fmt::Display for SplitterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SplitterMode::Token => "token",
            SplitterMode::FactList => "factlist",
            SplitterMode::Faq => "faq",
        };
        write!(f, "{}", name)
    }
}

/// Chunking parameters bound to an index at build time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexParams {
    pub chunk_min_tokens: usize,
    pub tokens_per_chunk: usize,
    pub chunk_overlap_tokens: usize,
    pub model_name: String,
    pub splitter_mode: SplitterMode,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            chunk_min_tokens: 8,
            tokens_per_chunk: 256,
            chunk_overlap_tokens: 64,
            model_name: "gpt-3.5-turbo".to_string(),
            splitter_mode: SplitterMode::Token,
        }
    }
}

impl IndexParams {
    /// Reject unusable configurations before any I/O. Overlap must stay
    /// below the window or the window start would never advance.
    pub fn validate(&self) -> Result<()> {
        if self.tokens_per_chunk == 0 {
            bail!("tokens_per_chunk must be greater than zero");
        }
        if self.chunk_overlap_tokens >= self.tokens_per_chunk {
            bail!(
                "chunk_overlap_tokens ({}) must be smaller than tokens_per_chunk ({})",
                self.chunk_overlap_tokens,
                self.tokens_per_chunk
            );
        }
        Ok(())
    }
}

/// A bounded span of source text plus provenance metadata; the atomic unit
/// stored in the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
}

impl Chunk {
    pub fn new(content: String, metadata: Metadata) -> Self {
        let mut hasher = Sha256::new();
        if let Some(source) = metadata.get(SOURCE_KEY) {
            hasher.update(source.as_bytes());
        }
        hasher.update(content.as_bytes());
        let hash = hex::encode(hasher.finalize());
        Self {
            id: hash[..16].to_string(),
            content,
            metadata,
        }
    }

    /// Recovered byte offset of this chunk in its source text, if any.
    pub fn offset(&self) -> Option<i64> {
        self.metadata.get(OFFSET_KEY).and_then(|v| v.parse().ok())
    }
}
