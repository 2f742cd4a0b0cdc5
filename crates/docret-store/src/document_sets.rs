use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::Mutex;

const SETS_FILE: &str = "document-sets.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentSetItem {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct DocumentSetList {
    document_set: Vec<DocumentSetItem>,
}

/// Registry of named document sets. Disk mode persists a single JSON file
/// under the storage root; memory mode keeps the list for the process
/// lifetime only.
pub struct DocumentSetStore {
    path: Option<PathBuf>,
    storage: Mutex<DocumentSetList>,
}

impl DocumentSetStore {
    pub fn on_disk(root: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(root.into().join(SETS_FILE)),
            storage: Mutex::new(DocumentSetList::default()),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            storage: Mutex::new(DocumentSetList::default()),
        }
    }

    pub fn load(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !path.is_file() {
            return Ok(());
        }
        let reader = BufReader::new(File::open(path)?);
        let list: DocumentSetList = serde_json::from_reader(reader)?;
        *self.storage.lock().expect("document set lock poisoned") = list;
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        let storage = self.storage.lock().expect("document set lock poisoned");
        serde_json::to_writer_pretty(writer, &*storage)?;
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        let storage = self.storage.lock().expect("document set lock poisoned");
        storage.document_set.iter().map(|d| d.name.clone()).collect()
    }

    /// Lookup is case-insensitive; stored names keep their original casing.
    pub fn find(&self, name: &str) -> Option<DocumentSetItem> {
        let storage = self.storage.lock().expect("document set lock poisoned");
        storage
            .document_set
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Add a set if it is not already present; duplicates are a no-op.
    pub fn add(&self, name: &str, auto_save: bool) -> Result<()> {
        let name = name.trim();
        if self.find(name).is_some() {
            return Ok(());
        }
        {
            let mut storage = self.storage.lock().expect("document set lock poisoned");
            storage.document_set.push(DocumentSetItem {
                name: name.to_string(),
            });
        }
        if auto_save {
            self.save()?;
        }
        Ok(())
    }
}
