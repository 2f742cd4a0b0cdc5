//! Chunks persisted one file per chunk as `chunk-NNNNN.txt`. The zero-padded
//! name is order-significant: file order is index order at build time.

use anyhow::Result;
use docret_core::models::Chunk;
use std::path::{Path, PathBuf};

const CHUNK_PREFIX: &str = "chunk-";
const CHUNK_EXT: &str = "txt";

fn chunk_file_name(index: usize) -> String {
    format!("{}{:05}.{}", CHUNK_PREFIX, index, CHUNK_EXT)
}

/// Write chunk contents in index order, replacing any previous dump.
pub fn save_chunks(dir: &Path, chunks: &[Chunk]) -> Result<Vec<PathBuf>> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    let mut paths = Vec::with_capacity(chunks.len());
    for (index, chunk) in chunks.iter().enumerate() {
        let path = dir.join(chunk_file_name(index));
        std::fs::write(&path, &chunk.content)?;
        paths.push(path);
    }
    Ok(paths)
}

/// Read chunk contents back in index order.
pub fn load_chunks(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .flatten()
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with(CHUNK_PREFIX) && name.ends_with(CHUNK_EXT))
        .collect();
    names.sort();
    names
        .into_iter()
        .map(|name| Ok(std::fs::read_to_string(dir.join(name))?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docret_core::models::Metadata;

    #[test]
    fn names_are_zero_padded_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let chunks: Vec<Chunk> = (0..12)
            .map(|i| Chunk::new(format!("chunk number {}", i), Metadata::new()))
            .collect();
        let paths = save_chunks(dir.path(), &chunks).unwrap();
        assert_eq!(paths[0].file_name().unwrap(), "chunk-00000.txt");
        assert_eq!(paths[11].file_name().unwrap(), "chunk-00011.txt");

        let loaded = load_chunks(dir.path()).unwrap();
        assert_eq!(loaded.len(), 12);
        assert_eq!(loaded[0], "chunk number 0");
        assert_eq!(loaded[11], "chunk number 11");
    }

    #[test]
    fn resave_replaces_previous_dump() {
        let dir = tempfile::tempdir().unwrap();
        let many: Vec<Chunk> = (0..3)
            .map(|i| Chunk::new(format!("old {}", i), Metadata::new()))
            .collect();
        save_chunks(dir.path(), &many).unwrap();
        let fewer = vec![Chunk::new("new".to_string(), Metadata::new())];
        save_chunks(dir.path(), &fewer).unwrap();
        assert_eq!(load_chunks(dir.path()).unwrap(), vec!["new".to_string()]);
    }

    #[test]
    fn missing_dir_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_chunks(&dir.path().join("nothing-here")).unwrap();
        assert!(loaded.is_empty());
    }
}
