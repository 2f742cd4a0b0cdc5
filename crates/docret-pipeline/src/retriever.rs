use anyhow::{anyhow, Result};
use docret_core::embeddings::Embedder;
use docret_core::models::Metadata;
use docret_index::{MetaStore, VectorIndex};
use std::sync::Arc;
use tracing::debug;

/// Factory resolving an embedder from its stable name. The retriever always
/// resolves the name persisted in index metadata, never the caller's
/// current configuration — mixing embeddings silently corrupts results.
pub type EmbedderFactory = Arc<dyn Fn(&str) -> Result<Arc<dyn Embedder>> + Send + Sync>;

/// One similarity hit with provenance metadata. Ephemeral, produced per
/// query.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub content: String,
    pub score: f32,
    pub metadata: Metadata,
}

/// Similarity search with threshold filtering on top of the vector index.
pub struct Retriever {
    meta: Arc<MetaStore>,
    index: Arc<VectorIndex>,
    embedders: EmbedderFactory,
}

impl Retriever {
    pub fn new(meta: Arc<MetaStore>, index: Arc<VectorIndex>, embedders: EmbedderFactory) -> Self {
        Self {
            meta,
            index,
            embedders,
        }
    }

    /// `score_threshold` semantics: `None` falls back to the index's
    /// default threshold; `0` (from either source) disables filtering
    /// entirely — it is the "no threshold" sentinel, not a threshold of
    /// zero.
    pub async fn search(
        &self,
        document_set: &str,
        index_name: &str,
        query: &str,
        k: usize,
        score_threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        let meta = self.meta.load(document_set, index_name);
        if let Some(err) = meta.error {
            return Err(anyhow!(
                "index '{}/{}' is not usable: {}",
                document_set,
                index_name,
                err
            ));
        }

        let embedder = (self.embedders)(&meta.embedding_name)?;
        let query_vector = embedder
            .embed(&[query.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow!("empty embedding response"))?;

        let hits = self
            .index
            .search(document_set, index_name, &query_vector, k)
            .await?;

        let threshold = score_threshold.or(meta.default_threshold).unwrap_or(0.0);
        debug!(
            "search '{}' on {}/{}: {} hits, threshold {}",
            query,
            document_set,
            index_name,
            hits.len(),
            threshold
        );

        Ok(hits
            .into_iter()
            .filter(|(score, _)| threshold == 0.0 || *score >= threshold)
            .map(|(score, chunk)| SearchResult {
                content: chunk.content,
                score,
                metadata: chunk.metadata,
            })
            .collect())
    }
}
