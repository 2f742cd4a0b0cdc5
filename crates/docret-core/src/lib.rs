pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod llm;
pub mod models;
