use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docret_core::config::Config;
use docret_core::llm::OpenAiChat;
use docret_core::models::DocumentInput;
use docret_pipeline::facts::cluster_facts;
use docret_pipeline::manager::{Pipeline, SearchOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "docret", about = "Document knowledge-base indexing, search and Q&A")]
pub struct Cli {
    /// Path to a .docret.yml config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build (or rebuild) an index from extracted text files
    Index {
        /// Document set the index belongs to
        #[arg(long)]
        set: String,
        /// Index name inside the document set
        #[arg(long)]
        name: String,
        /// Plain-text files produced by the extraction step
        files: Vec<PathBuf>,
    },
    /// Similarity search against an index
    Search {
        #[arg(long)]
        set: String,
        #[arg(long)]
        name: String,
        query: String,
        /// Number of results to return
        #[arg(long)]
        top: Option<usize>,
        /// Minimum similarity score; 0 disables filtering
        #[arg(long)]
        threshold: Option<f32>,
        /// Re-score each hit with the LLM before ranking
        #[arg(long)]
        rescore: bool,
    },
    /// Answer a question from an index
    Answer {
        #[arg(long)]
        set: String,
        #[arg(long)]
        name: String,
        question: String,
        #[arg(long)]
        rescore: bool,
    },
    /// List document sets and their indexes
    Sets,
    /// Group facts (one per line) into clusters by embedding similarity
    Facts {
        file: PathBuf,
        #[arg(long, default_value_t = 5)]
        clusters: usize,
    },
}

fn build_pipeline(config_path: Option<&Path>) -> Result<(Pipeline, Config)> {
    let config = Config::load_from(config_path)?;
    let llm = Arc::new(OpenAiChat::new(
        config.llm.model.clone(),
        config.llm.max_tokens,
    )?);
    Ok((Pipeline::new(config.clone(), llm), config))
}

pub async fn handle_index(
    set: String,
    name: String,
    files: Vec<PathBuf>,
    config_path: Option<&Path>,
) -> Result<()> {
    let (pipeline, _) = build_pipeline(config_path)?;

    let mut inputs = Vec::with_capacity(files.len());
    for file in &files {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        let source = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.display().to_string());
        inputs.push(DocumentInput::from_source(text, &source));
    }

    let log = pipeline.build_index(&set, &name, &inputs).await?;
    for line in log {
        println!("{}", line);
    }
    Ok(())
}

pub async fn handle_search(
    set: String,
    name: String,
    query: String,
    top: Option<usize>,
    threshold: Option<f32>,
    rescore: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let (pipeline, config) = build_pipeline(config_path)?;

    let mut opts = SearchOptions::from_config(&config);
    if let Some(top) = top {
        opts.top_k = top;
    }
    if threshold.is_some() {
        opts.score_threshold = threshold;
    }
    if rescore {
        opts.llm_rescoring = true;
    }

    let results = pipeline.search(&set, &name, &query, &opts).await?;
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (rank, result) in results.iter().enumerate() {
        println!("#{} score {:.3}", rank + 1, result.score);
        if let Some(llm_score) = result.llm_score {
            println!(
                "   llm score {:.2}: {}",
                llm_score,
                result.llm_explanation.as_deref().unwrap_or("-")
            );
        }
        if let Some(source) = result.metadata.get("p_source") {
            println!("   source: {}", source);
        }
        println!("   {}", snippet(&result.content, 160));
    }
    Ok(())
}

pub async fn handle_answer(
    set: String,
    name: String,
    question: String,
    rescore: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let (pipeline, config) = build_pipeline(config_path)?;

    let mut opts = SearchOptions::from_config(&config);
    if rescore {
        opts.llm_rescoring = true;
    }

    let result = pipeline.answer(&set, &name, &question, &opts, None).await;
    if result.failed {
        println!("Answer failed after {} tokens:", result.tokens_used);
        for step in &result.steps {
            println!("  {}", step);
        }
        return Ok(());
    }
    println!("{}", result.answer);
    println!("({} tokens)", result.tokens_used);
    Ok(())
}

pub async fn handle_sets(config_path: Option<&Path>) -> Result<()> {
    let (pipeline, _) = build_pipeline(config_path)?;
    let sets = pipeline.document_sets()?;
    if sets.is_empty() {
        println!("No document sets.");
        return Ok(());
    }
    for set in sets {
        println!("{}", set);
        for index in pipeline.indexes(&set) {
            println!("  {}", index);
        }
    }
    Ok(())
}

pub async fn handle_facts(
    file: PathBuf,
    clusters: usize,
    config_path: Option<&Path>,
) -> Result<()> {
    let (pipeline, _) = build_pipeline(config_path)?;
    let content = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let facts: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToString::to_string)
        .collect();

    let embedder = pipeline.embedder()?;
    let grouped = cluster_facts(&facts, clusters, embedder.as_ref()).await?;
    for cluster in grouped {
        println!("{}:", cluster.name);
        for fact in cluster.facts {
            println!("  - {}", fact);
        }
    }
    Ok(())
}

fn snippet(text: &str, max_chars: usize) -> String {
    let flattened = text.replace('\n', " ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }
    let cut: String = flattened.chars().take(max_chars).collect();
    format!("{}...", cut)
}
