use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;

pub mod external;
pub mod ollama;

pub use external::ExternalEmbedder;
pub use ollama::OllamaEmbedder;

pub const OPENAI_EMBEDDING: &str = "openai";
pub const OLLAMA_EMBEDDING: &str = "ollama";

/// A named embedding provider. The name is persisted into index metadata at
/// build time and resolved again at query time, so an index is always
/// queried with the embedding it was built with.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable registry name, round-trips through index metadata.
    fn name(&self) -> &str;
    /// Similarity threshold that works well for this embedding when the
    /// caller does not set one.
    fn default_threshold(&self) -> f32;
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Catalogue entry describing an available embedding.
#[derive(Debug, Clone)]
pub struct EmbeddingInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub default_threshold: f32,
}

pub fn available_embeddings() -> Vec<EmbeddingInfo> {
    vec![
        EmbeddingInfo {
            name: OPENAI_EMBEDDING,
            description: "OpenAI text-embedding-3-small, hosted",
            default_threshold: external::DEFAULT_THRESHOLD,
        },
        EmbeddingInfo {
            name: OLLAMA_EMBEDDING,
            description: "Ollama nomic-embed-text, local",
            default_threshold: ollama::DEFAULT_THRESHOLD,
        },
    ]
}

/// Resolve an embedder by its stable name. An unknown name is a
/// configuration error, reported before any query is issued.
pub fn select_embedder(name: &str, model_name: &str) -> Result<Arc<dyn Embedder>> {
    let model = (!model_name.is_empty()).then(|| model_name.to_string());
    match name {
        OPENAI_EMBEDDING => Ok(Arc::new(ExternalEmbedder::new(model)?)),
        OLLAMA_EMBEDDING => Ok(Arc::new(OllamaEmbedder::new(model)?)),
        other => Err(anyhow!("unsupported embedding '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_embedding_name_is_rejected() {
        assert!(select_embedder("sbert", "").is_err());
    }

    #[test]
    fn catalogue_names_resolve() {
        for info in available_embeddings() {
            if info.name == OPENAI_EMBEDDING && std::env::var("OPENAI_API_KEY").is_err() {
                continue;
            }
            let embedder = select_embedder(info.name, "").unwrap();
            assert_eq!(embedder.name(), info.name);
            assert_eq!(embedder.default_threshold(), info.default_threshold);
        }
    }
}
