pub mod facts;
pub mod manager;
pub mod prompts;
pub mod refine;
pub mod relevance;
pub mod retriever;

pub use manager::{AnswerResult, Pipeline, ScoredResult, SearchOptions};
pub use refine::{RefineAnswerChain, RefineAnswerResult, NO_ANSWER};
pub use relevance::{RelevanceScore, RelevanceScorer};
pub use retriever::{Retriever, SearchResult};
