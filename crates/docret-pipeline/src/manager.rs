use crate::refine::{RefineAnswerChain, RefineAnswerResult, NO_ANSWER};
use crate::relevance::RelevanceScorer;
use crate::retriever::{EmbedderFactory, Retriever, SearchResult};
use anyhow::Result;
use docret_core::chunking::Splitter;
use docret_core::config::Config;
use docret_core::embeddings::{select_embedder, Embedder};
use docret_core::llm::LlmClient;
use docret_core::models::DocumentInput;
use docret_index::{IndexMeta, MetaStore, VectorIndex};
use docret_store::{chunk_files, DocumentSetStore, QueryLog, UserQueryItem};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-query knobs; defaults come from the search section of the config.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub top_k: usize,
    /// `None` defers to the index's default threshold; `Some(0.0)` disables
    /// filtering.
    pub score_threshold: Option<f32>,
    pub llm_rescoring: bool,
    /// Sentinel semantics match `score_threshold`: `0.0` keeps everything.
    pub llm_threshold: f32,
}

impl SearchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.search.default_top_k,
            score_threshold: (config.search.score_threshold > 0.0)
                .then_some(config.search.score_threshold),
            llm_rescoring: config.search.llm_rescoring,
            llm_threshold: config.search.llm_threshold,
        }
    }
}

/// One retrieved chunk, optionally with the secondary LLM judgement.
#[derive(Debug, Clone)]
pub struct ScoredResult {
    pub content: String,
    pub score: f32,
    pub metadata: docret_core::models::Metadata,
    pub llm_score: Option<f32>,
    pub llm_explanation: Option<String>,
}

impl ScoredResult {
    fn from_search(result: SearchResult) -> Self {
        Self {
            content: result.content,
            score: result.score,
            metadata: result.metadata,
            llm_score: None,
            llm_explanation: None,
        }
    }
}

/// Outcome of one answer operation. `failed` marks an aborted refine; the
/// token count covers rescoring and refinement either way.
#[derive(Debug, Clone, Default)]
pub struct AnswerResult {
    pub answer: String,
    pub tokens_used: usize,
    pub failed: bool,
    pub steps: Vec<String>,
}

/// The context object composing splitters, index, retriever, scorer and
/// refiner into the three public operations. Constructed once per process
/// with its collaborators injected; holds no ambient global state.
pub struct Pipeline {
    config: Config,
    meta: Arc<MetaStore>,
    index: Arc<VectorIndex>,
    retriever: Retriever,
    scorer: RelevanceScorer,
    refiner: RefineAnswerChain,
    document_sets: DocumentSetStore,
    query_log: QueryLog,
    embedders: EmbedderFactory,
}

impl Pipeline {
    /// Wire up against the real embedding registry.
    pub fn new(config: Config, llm: Arc<dyn LlmClient>) -> Self {
        let model_name = config.embeddings.model_name.clone();
        let embedders: EmbedderFactory =
            Arc::new(move |name: &str| select_embedder(name, &model_name));
        Self::with_embedders(config, llm, embedders)
    }

    /// Wire up with a caller-supplied embedder factory (tests, alternative
    /// registries).
    pub fn with_embedders(
        config: Config,
        llm: Arc<dyn LlmClient>,
        embedders: EmbedderFactory,
    ) -> Self {
        let (meta, index, document_sets, query_log) = if config.storage.in_memory {
            (
                Arc::new(MetaStore::in_memory()),
                Arc::new(VectorIndex::in_memory()),
                DocumentSetStore::in_memory(),
                QueryLog::in_memory(),
            )
        } else {
            let root = &config.storage.root;
            (
                Arc::new(MetaStore::on_disk(root)),
                Arc::new(VectorIndex::on_disk(root)),
                DocumentSetStore::on_disk(root),
                QueryLog::on_disk(root),
            )
        };

        let retriever = Retriever::new(meta.clone(), index.clone(), embedders.clone());
        Self {
            config,
            meta,
            index,
            retriever,
            scorer: RelevanceScorer::new(llm.clone()),
            refiner: RefineAnswerChain::new(llm),
            document_sets,
            query_log,
            embedders,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build (or rebuild) one index from extracted documents. Configuration
    /// misuse fails fast; everything downstream is reported through the
    /// returned build log.
    pub async fn build_index(
        &self,
        document_set: &str,
        index_name: &str,
        inputs: &[DocumentInput],
    ) -> Result<Vec<String>> {
        let params = self.config.index.params.clone();
        let splitter = Splitter::for_params(&params, &self.config.index.fact_separator)?;
        let embedder = (self.embedders)(self.config.embeddings.backend.name())?;

        let mut log = vec![format!("Loaded {} document(s)", inputs.len())];
        let chunks = splitter.split(inputs);

        self.document_sets.load()?;
        self.document_sets.add(document_set, true)?;

        // Tear down the old index fully before writing anything: a
        // half-written pair of meta and collection must never be reachable.
        self.index.delete(document_set, index_name)?;
        self.meta.delete(document_set, index_name)?;

        // Meta goes first so a reader can validate embedding compatibility
        // as soon as the collection appears.
        self.meta.save(&IndexMeta {
            params,
            document_set: document_set.to_string(),
            index_name: index_name.to_string(),
            embedding_name: embedder.name().to_string(),
            default_threshold: Some(embedder.default_threshold()),
            error: None,
        })?;

        log.extend(
            self.index
                .build(document_set, index_name, &chunks, embedder.as_ref())
                .await,
        );

        if !self.config.storage.in_memory {
            let dir = self
                .config
                .storage
                .root
                .join(document_set)
                .join(index_name)
                .join("chunks");
            match chunk_files::save_chunks(&dir, &chunks) {
                Ok(paths) => log.push(format!("Saved {} chunk file(s)", paths.len())),
                Err(err) => log.push(format!("Error: failed to save chunk files: {}", err)),
            }
        }

        Ok(log)
    }

    /// Similarity search, with optional LLM re-scoring of each hit.
    pub async fn search(
        &self,
        document_set: &str,
        index_name: &str,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<ScoredResult>> {
        let (results, tokens) = self
            .search_with_tokens(document_set, index_name, query, opts)
            .await?;
        if tokens > 0 {
            info!("relevance rescoring used {} tokens", tokens);
        }
        Ok(results)
    }

    async fn search_with_tokens(
        &self,
        document_set: &str,
        index_name: &str,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<(Vec<ScoredResult>, usize)> {
        let hits = self
            .retriever
            .search(
                document_set,
                index_name,
                query,
                opts.top_k,
                opts.score_threshold,
            )
            .await?;

        let mut results: Vec<ScoredResult> =
            hits.into_iter().map(ScoredResult::from_search).collect();
        if !opts.llm_rescoring {
            return Ok((results, 0));
        }

        let mut tokens = 0usize;
        for result in &mut results {
            let relevance = self.scorer.score(query, &result.content).await;
            tokens += relevance.tokens_used;
            result.llm_score = Some(relevance.score);
            result.llm_explanation = relevance.explanation;
        }

        if opts.llm_threshold > 0.0 {
            results.retain(|r| r.llm_score.unwrap_or(0.0) >= opts.llm_threshold);
        }
        results.sort_by(|a, b| {
            b.llm_score
                .partial_cmp(&a.llm_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok((results, tokens))
    }

    /// Retrieve, optionally rescore, then fold the ranked chunks into one
    /// answer. Refinement failures surface through the `failed` flag with
    /// partial token usage, never as an error.
    pub async fn answer(
        &self,
        document_set: &str,
        index_name: &str,
        question: &str,
        opts: &SearchOptions,
        cancel: Option<&AtomicBool>,
    ) -> AnswerResult {
        let (results, rescore_tokens) = match self
            .search_with_tokens(document_set, index_name, question, opts)
            .await
        {
            Ok(found) => found,
            Err(err) => {
                return AnswerResult {
                    failed: true,
                    steps: vec![format!("Error: {}", err)],
                    ..Default::default()
                }
            }
        };

        if results.is_empty() {
            return AnswerResult {
                answer: NO_ANSWER.to_string(),
                tokens_used: rescore_tokens,
                failed: false,
                steps: vec!["No relevant chunks found".to_string()],
            };
        }

        let chunk_texts: Vec<String> = results.iter().map(|r| r.content.clone()).collect();
        let refined: RefineAnswerResult = self.refiner.run(question, &chunk_texts, cancel).await;

        if let Err(err) = self
            .query_log
            .log_query(document_set, question, &refined.answer, "")
        {
            warn!("failed to log query: {}", err);
        }

        AnswerResult {
            answer: refined.answer,
            tokens_used: rescore_tokens + refined.tokens_used,
            failed: refined.failed,
            steps: refined.steps,
        }
    }

    /// Registered document sets (disk mode reloads the registry first).
    pub fn document_sets(&self) -> Result<Vec<String>> {
        self.document_sets.load()?;
        Ok(self.document_sets.names())
    }

    /// Index names available under a document set.
    pub fn indexes(&self, document_set: &str) -> Vec<String> {
        self.meta.list(document_set)
    }

    /// Query history for a document set; `limit == 0` means all.
    pub fn query_history(&self, document_set: &str, limit: usize) -> Result<Vec<UserQueryItem>> {
        self.query_log.history(document_set, limit)
    }

    /// Delete one index: collection and metadata go together.
    pub fn delete_index(&self, document_set: &str, index_name: &str) -> Result<()> {
        self.index.delete(document_set, index_name)?;
        self.meta.delete(document_set, index_name)?;
        Ok(())
    }

    /// Embedder for offline jobs (fact clustering) that share the
    /// configured embedding collaborator.
    pub fn embedder(&self) -> Result<Arc<dyn Embedder>> {
        (self.embedders)(self.config.embeddings.backend.name())
    }
}
