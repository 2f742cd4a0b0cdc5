mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{
    handle_answer, handle_facts, handle_index, handle_search, handle_sets, Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone();

    match cli.command {
        Commands::Index { set, name, files } => {
            handle_index(set, name, files, config_path.as_deref()).await?;
        }
        Commands::Search {
            set,
            name,
            query,
            top,
            threshold,
            rescore,
        } => {
            handle_search(set, name, query, top, threshold, rescore, config_path.as_deref())
                .await?;
        }
        Commands::Answer {
            set,
            name,
            question,
            rescore,
        } => {
            handle_answer(set, name, question, rescore, config_path.as_deref()).await?;
        }
        Commands::Sets => {
            handle_sets(config_path.as_deref()).await?;
        }
        Commands::Facts { file, clusters } => {
            handle_facts(file, clusters, config_path.as_deref()).await?;
        }
    }

    Ok(())
}
