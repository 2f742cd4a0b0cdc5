pub mod chunk_files;
pub mod document_sets;
pub mod query_log;

pub use document_sets::DocumentSetStore;
pub use query_log::{QueryLog, UserQueryItem};
