pub mod meta;
pub mod vector;

pub use meta::{IndexMeta, MetaStore};
pub use vector::{StoredChunk, VectorIndex};
