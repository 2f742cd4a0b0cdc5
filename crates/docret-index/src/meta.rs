use anyhow::Result;
use docret_core::models::IndexParams;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const META_FILE: &str = "index-meta.json";

/// Persistent binding between an index, its chunking parameters and its
/// embedding identity, keyed by `(document_set, index_name)`. Written
/// whenever the index is rebuilt, read before every query so embedding
/// compatibility can be checked up front.
///
/// The on-disk schema evolves by additive fields only — older records must
/// keep parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub params: IndexParams,
    pub document_set: String,
    pub index_name: String,
    pub embedding_name: String,
    #[serde(default)]
    pub default_threshold: Option<f32>,
    #[serde(default)]
    pub error: Option<String>,
}

impl IndexMeta {
    /// A meta carrying only an error, for callers that branch instead of
    /// unwinding.
    pub fn with_error(message: impl Into<String>) -> Self {
        Self {
            params: IndexParams::default(),
            document_set: String::new(),
            index_name: String::new(),
            embedding_name: String::new(),
            default_threshold: None,
            error: Some(message.into()),
        }
    }
}

enum MetaBackend {
    Disk(PathBuf),
    Memory(Mutex<HashMap<(String, String), IndexMeta>>),
}

/// Save/load of [`IndexMeta`] records. `load` never fails: any I/O or parse
/// problem comes back as a meta with only `error` populated.
pub struct MetaStore {
    backend: MetaBackend,
}

impl MetaStore {
    pub fn on_disk(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: MetaBackend::Disk(root.into()),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backend: MetaBackend::Memory(Mutex::new(HashMap::new())),
        }
    }

    fn meta_path(root: &Path, document_set: &str, index_name: &str) -> PathBuf {
        root.join(document_set).join(index_name).join(META_FILE)
    }

    pub fn save(&self, meta: &IndexMeta) -> Result<()> {
        match &self.backend {
            MetaBackend::Memory(map) => {
                let mut map = map.lock().expect("meta store lock poisoned");
                map.insert(
                    (meta.document_set.clone(), meta.index_name.clone()),
                    meta.clone(),
                );
                Ok(())
            }
            MetaBackend::Disk(root) => {
                let path = Self::meta_path(root, &meta.document_set, &meta.index_name);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                // Write-then-rename so a reader never sees a half-written
                // record.
                let tmp = path.with_extension("json.tmp");
                std::fs::write(&tmp, serde_json::to_string_pretty(meta)?)?;
                std::fs::rename(&tmp, &path)?;
                Ok(())
            }
        }
    }

    pub fn load(&self, document_set: &str, index_name: &str) -> IndexMeta {
        match &self.backend {
            MetaBackend::Memory(map) => {
                let map = map.lock().expect("meta store lock poisoned");
                map.get(&(document_set.to_string(), index_name.to_string()))
                    .cloned()
                    .unwrap_or_else(|| {
                        IndexMeta::with_error(format!(
                            "no metadata for index '{}/{}'",
                            document_set, index_name
                        ))
                    })
            }
            MetaBackend::Disk(root) => {
                let path = Self::meta_path(root, document_set, index_name);
                if !path.is_file() {
                    return IndexMeta::with_error(format!(
                        "no metadata for index '{}/{}'",
                        document_set, index_name
                    ));
                }
                match std::fs::read_to_string(&path)
                    .map_err(anyhow::Error::from)
                    .and_then(|s| serde_json::from_str(&s).map_err(anyhow::Error::from))
                {
                    Ok(meta) => meta,
                    Err(err) => {
                        IndexMeta::with_error(format!("failed to load index metadata: {}", err))
                    }
                }
            }
        }
    }

    pub fn delete(&self, document_set: &str, index_name: &str) -> Result<()> {
        match &self.backend {
            MetaBackend::Memory(map) => {
                let mut map = map.lock().expect("meta store lock poisoned");
                map.remove(&(document_set.to_string(), index_name.to_string()));
                Ok(())
            }
            MetaBackend::Disk(root) => {
                let path = Self::meta_path(root, document_set, index_name);
                if path.is_file() {
                    std::fs::remove_file(&path)?;
                }
                Ok(())
            }
        }
    }

    /// Names of indexes with a metadata record under the document set.
    pub fn list(&self, document_set: &str) -> Vec<String> {
        match &self.backend {
            MetaBackend::Memory(map) => {
                let map = map.lock().expect("meta store lock poisoned");
                let mut names: Vec<String> = map
                    .keys()
                    .filter(|(set, _)| set == document_set)
                    .map(|(_, name)| name.clone())
                    .collect();
                names.sort();
                names
            }
            MetaBackend::Disk(root) => {
                let set_dir = root.join(document_set);
                let Ok(entries) = std::fs::read_dir(&set_dir) else {
                    return Vec::new();
                };
                let mut names: Vec<String> = entries
                    .flatten()
                    .filter(|e| e.path().join(META_FILE).is_file())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect();
                names.sort();
                names
            }
        }
    }
}
