use anyhow::{anyhow, Result};
use async_trait::async_trait;
use docret_core::config::Config;
use docret_core::embeddings::Embedder;
use docret_core::llm::{Completion, LlmClient};
use docret_core::models::{DocumentInput, SplitterMode};
use docret_pipeline::manager::{Pipeline, SearchOptions};
use docret_pipeline::refine::{RefineAnswerChain, NO_ANSWER};
use docret_pipeline::relevance::RelevanceScorer;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

/// LLM double that replays queued replies and records every prompt.
struct ScriptedLlm {
    replies: Mutex<Vec<Result<Completion>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    fn new(replies: Vec<Result<Completion>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn reply(text: &str, tokens: usize) -> Result<Completion> {
        Ok(Completion {
            text: text.to_string(),
            tokens_used: tokens,
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> Result<Completion> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Err(anyhow!("script exhausted"));
        }
        replies.remove(0)
    }
}

/// Deterministic embedder: one-hot on text length. An exact-content query
/// maps to the same unit vector (similarity 1.0); any other text in these
/// fixtures lands on an orthogonal axis (similarity 1/3), so thresholds
/// behave predictably.
struct StubEmbedder;

fn embed_one(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; 32];
    v[text.len() % 32] = 1.0;
    v
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn name(&self) -> &str {
        "stub"
    }

    fn default_threshold(&self) -> f32 {
        0.0
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| embed_one(t)).collect())
    }
}

fn memory_config() -> Config {
    let mut config = Config::default();
    config.storage.in_memory = true;
    config.index.params.splitter_mode = SplitterMode::FactList;
    config.index.fact_separator = "\n\n".to_string();
    config
}

fn pipeline_with(llm: Arc<dyn LlmClient>) -> Pipeline {
    Pipeline::with_embedders(
        memory_config(),
        llm,
        Arc::new(|_name: &str| Ok(Arc::new(StubEmbedder) as Arc<dyn Embedder>)),
    )
}

fn options(top_k: usize) -> SearchOptions {
    SearchOptions {
        top_k,
        score_threshold: Some(0.0),
        llm_rescoring: false,
        llm_threshold: 0.0,
    }
}

const FACTS: &str = "Paris is the capital of France.\n\nThe Eiffel Tower is in Paris.\n\nBerlin has many museums.";

async fn build_fixture(pipeline: &Pipeline) {
    let docs = vec![DocumentInput::from_source(FACTS, "facts.txt")];
    let log = pipeline.build_index("travel", "main", &docs).await.unwrap();
    assert!(log.iter().any(|l| l.contains("Total count of chunks 3")));
    assert!(log.iter().any(|l| l.contains("stored in memory")));
}

#[tokio::test]
async fn build_then_search_returns_ranked_results() {
    let pipeline = pipeline_with(ScriptedLlm::new(vec![]));
    build_fixture(&pipeline).await;

    let results = pipeline
        .search(
            "travel",
            "main",
            "Paris is the capital of France.",
            &options(2),
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].content, "Paris is the capital of France.");
    assert!((results[0].score - 1.0).abs() < 1e-6);
    assert!(results[0].score >= results[1].score);
    assert_eq!(
        results[0].metadata.get("p_source").map(String::as_str),
        Some("facts.txt")
    );
}

#[tokio::test]
async fn high_threshold_filters_everything_but_exact_hits() {
    let pipeline = pipeline_with(ScriptedLlm::new(vec![]));
    build_fixture(&pipeline).await;

    let mut opts = options(3);
    opts.score_threshold = Some(0.9);
    let strict = pipeline
        .search(
            "travel",
            "main",
            "Paris is the capital of France.",
            &opts,
        )
        .await
        .unwrap();
    assert_eq!(strict.len(), 1);

    opts.score_threshold = Some(0.0);
    let all = pipeline
        .search(
            "travel",
            "main",
            "Paris is the capital of France.",
            &opts,
        )
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn searching_an_unbuilt_index_reports_the_metadata_error() {
    let pipeline = pipeline_with(ScriptedLlm::new(vec![]));
    let err = pipeline
        .search("travel", "missing", "anything", &options(2))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not usable"));
}

#[tokio::test]
async fn invalid_params_fail_before_any_io() {
    let llm = ScriptedLlm::new(vec![]);
    let mut config = memory_config();
    config.index.params.splitter_mode = SplitterMode::Token;
    config.index.params.tokens_per_chunk = 32;
    config.index.params.chunk_overlap_tokens = 32;
    let pipeline = Pipeline::with_embedders(
        config,
        llm,
        Arc::new(|_name: &str| Ok(Arc::new(StubEmbedder) as Arc<dyn Embedder>)),
    );

    let docs = vec![DocumentInput::from_source("some text", "a.txt")];
    assert!(pipeline.build_index("travel", "main", &docs).await.is_err());
    // Nothing was written: the index is still unknown.
    assert!(pipeline.indexes("travel").is_empty());
}

#[tokio::test]
async fn rebuild_keeps_chunk_count_and_meta_stable() {
    let pipeline = pipeline_with(ScriptedLlm::new(vec![]));
    build_fixture(&pipeline).await;
    build_fixture(&pipeline).await;
    assert_eq!(pipeline.indexes("travel"), vec!["main".to_string()]);
    assert_eq!(pipeline.document_sets().unwrap(), vec!["travel".to_string()]);
}

#[tokio::test]
async fn rescoring_isolates_failures_and_reorders() {
    // Three chunks retrieved; the middle relevance call returns garbage.
    let llm = ScriptedLlm::new(vec![
        ScriptedLlm::reply(r#"{"score": 0.4, "explanation": "partial"}"#, 10),
        ScriptedLlm::reply("this is not json at all", 7),
        ScriptedLlm::reply(r#"{"score": 0.9, "explanation": "direct answer"}"#, 12),
    ]);
    let pipeline = pipeline_with(llm);
    build_fixture(&pipeline).await;

    let mut opts = options(3);
    opts.llm_rescoring = true;
    opts.llm_threshold = 0.3;
    let results = pipeline
        .search("travel", "main", "Where is the Eiffel Tower?", &opts)
        .await
        .unwrap();

    // The failed chunk scored 0 and fell below the threshold; the rest are
    // re-sorted by LLM score, best first.
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].llm_score, Some(0.9));
    assert_eq!(results[1].llm_score, Some(0.4));
    assert_eq!(
        results[0].llm_explanation.as_deref(),
        Some("direct answer")
    );
}

#[tokio::test]
async fn zero_llm_threshold_keeps_failed_chunks() {
    let llm = ScriptedLlm::new(vec![
        ScriptedLlm::reply("garbage", 1),
        ScriptedLlm::reply(r#"{"score": 0.8, "explanation": "yes"}"#, 1),
        ScriptedLlm::reply(r#"{"score": 0.5, "explanation": "somewhat"}"#, 1),
    ]);
    let pipeline = pipeline_with(llm);
    build_fixture(&pipeline).await;

    let mut opts = options(3);
    opts.llm_rescoring = true;
    opts.llm_threshold = 0.0;
    let results = pipeline
        .search("travel", "main", "Where is the Eiffel Tower?", &opts)
        .await
        .unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[2].llm_score, Some(0.0));
}

#[tokio::test]
async fn answer_folds_chunks_and_logs_the_query() {
    let llm = ScriptedLlm::new(vec![
        ScriptedLlm::reply(r#"{"answer": "Paris"}"#, 20),
        ScriptedLlm::reply(r#"{"not_useful": "True"}"#, 8),
        ScriptedLlm::reply(
            r#"{"not_useful": false, "refined_answer": "Paris, the capital of France"}"#,
            9,
        ),
    ]);
    let pipeline = pipeline_with(llm.clone());
    build_fixture(&pipeline).await;

    let result = pipeline
        .answer(
            "travel",
            "main",
            "What is the capital of France?",
            &options(3),
            None,
        )
        .await;

    assert!(!result.failed);
    assert_eq!(result.answer, "Paris, the capital of France");
    assert_eq!(result.tokens_used, 37);

    // First prompt is a seed prompt, later ones carry the running answer.
    let prompts = llm.prompts();
    assert!(prompts[0].contains("<text>"));
    assert!(prompts[1].contains("<existing_answer>"));
    assert!(prompts[1].contains("Paris"));

    let history = pipeline.query_history("travel", 0).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].query, "What is the capital of France?");
    assert_eq!(history[0].answer, "Paris, the capital of France");
}

#[tokio::test]
async fn answer_failure_reports_partial_tokens_not_an_error() {
    let llm = ScriptedLlm::new(vec![
        ScriptedLlm::reply(r#"{"answer": "Paris"}"#, 15),
        Err(anyhow!("connection reset")),
    ]);
    let pipeline = pipeline_with(llm);
    build_fixture(&pipeline).await;

    let result = pipeline
        .answer(
            "travel",
            "main",
            "What is the capital of France?",
            &options(3),
            None,
        )
        .await;
    assert!(result.failed);
    assert_eq!(result.answer, "Paris");
    assert_eq!(result.tokens_used, 15);
    assert!(result.steps.iter().any(|s| s.contains("connection reset")));
}

#[tokio::test]
async fn refiner_keeps_seeding_until_a_real_answer() {
    let llm = ScriptedLlm::new(vec![
        ScriptedLlm::reply(r#"{"answer": "No answer"}"#, 5),
        ScriptedLlm::reply(r#"{"answer": "Berlin"}"#, 6),
        ScriptedLlm::reply(r#"{"not_useful": true}"#, 4),
    ]);
    let chain = RefineAnswerChain::new(llm.clone());
    let chunks = vec![
        "nothing useful here".to_string(),
        "Berlin is the capital of Germany.".to_string(),
        "Germany is in Europe.".to_string(),
    ];
    let result = chain
        .run("What is the capital of Germany?", &chunks, None)
        .await;

    assert!(!result.failed);
    assert_eq!(result.answer, "Berlin");
    assert_eq!(result.tokens_used, 15);

    // Chunk 2 still received the seed prompt; only chunk 3 was a refine.
    let prompts = llm.prompts();
    assert!(prompts[1].contains("<text>"));
    assert!(prompts[2].contains("<existing_answer>"));
}

#[tokio::test]
async fn refiner_never_discards_the_seed_without_an_explicit_override() {
    let llm = ScriptedLlm::new(vec![
        ScriptedLlm::reply(r#"{"answer": "Paris"}"#, 3),
        // Contradictory reply: not useful, but with a refined_answer field.
        ScriptedLlm::reply(
            r#"{"not_useful": "True", "refined_answer": "discard me"}"#,
            3,
        ),
    ]);
    let chain = RefineAnswerChain::new(llm);
    let chunks = vec![
        "Paris is the capital of France.".to_string(),
        "The Eiffel Tower is in Paris.".to_string(),
    ];
    let result = chain
        .run("What is the capital of France?", &chunks, None)
        .await;
    assert!(result.answer.contains("Paris"));
    assert_eq!(result.tokens_used, 6);
}

#[tokio::test]
async fn refiner_with_no_chunks_returns_the_sentinel() {
    let chain = RefineAnswerChain::new(ScriptedLlm::new(vec![]));
    let result = chain.run("anything", &[], None).await;
    assert!(!result.failed);
    assert_eq!(result.answer, NO_ANSWER);
    assert_eq!(result.tokens_used, 0);
}

#[tokio::test]
async fn cancellation_stops_before_the_next_chunk() {
    let llm = ScriptedLlm::new(vec![ScriptedLlm::reply(r#"{"answer": "Paris"}"#, 5)]);
    let chain = RefineAnswerChain::new(llm.clone());
    let cancel = AtomicBool::new(true);
    let result = chain
        .run(
            "question",
            &["chunk one".to_string(), "chunk two".to_string()],
            Some(&cancel),
        )
        .await;

    // Cancelled before the first call: no prompts issued, no tokens spent,
    // not a failure.
    assert!(!result.failed);
    assert_eq!(result.tokens_used, 0);
    assert!(llm.prompts().is_empty());
    assert!(result.steps.iter().any(|s| s.contains("Cancelled")));
}

#[tokio::test]
async fn relevance_scorer_counts_tokens_for_unparseable_replies() {
    let llm = ScriptedLlm::new(vec![ScriptedLlm::reply("{ broken", 11)]);
    let scorer = RelevanceScorer::new(llm);
    let score = scorer.score("query", "content").await;
    assert_eq!(score.score, 0.0);
    assert_eq!(score.tokens_used, 11);
    assert!(score.error.is_some());
    assert!(score.explanation.is_none());
}

#[tokio::test]
async fn delete_index_removes_collection_and_meta_together() {
    let pipeline = pipeline_with(ScriptedLlm::new(vec![]));
    build_fixture(&pipeline).await;
    pipeline.delete_index("travel", "main").unwrap();
    assert!(pipeline.indexes("travel").is_empty());
    assert!(pipeline
        .search("travel", "main", "anything", &options(2))
        .await
        .is_err());
}
