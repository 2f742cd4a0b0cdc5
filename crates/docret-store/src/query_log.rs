use anyhow::Result;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const LOG_FILE: &str = "log_query.txt";
const QUERY_PREFIX: &str = "Q:";
const ANSWER_PREFIX: &str = "A:";
const SETUP_PREFIX: &str = "S:";

/// One logged question and its answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQueryItem {
    pub query: String,
    pub answer: String,
}

/// Append-only query history, one line-oriented text log per document set.
/// Each entry is a `Q:` line, optionally followed by `A:` and `S:` lines.
pub struct QueryLog {
    root: Option<PathBuf>,
    memory: Mutex<HashMap<String, Vec<UserQueryItem>>>,
}

impl QueryLog {
    pub fn on_disk(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            memory: Mutex::new(HashMap::new()),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            root: None,
            memory: Mutex::new(HashMap::new()),
        }
    }

    fn log_path(root: &Path, document_set: &str) -> PathBuf {
        root.join(document_set).join(LOG_FILE)
    }

    pub fn log_query(
        &self,
        document_set: &str,
        query: &str,
        answer: &str,
        setup: &str,
    ) -> Result<()> {
        let Some(root) = &self.root else {
            let mut memory = self.memory.lock().expect("query log lock poisoned");
            memory
                .entry(document_set.to_string())
                .or_default()
                .push(UserQueryItem {
                    query: query.to_string(),
                    answer: answer.to_string(),
                });
            return Ok(());
        };

        let path = Self::log_path(root, document_set);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        writeln!(file, "{}{}", QUERY_PREFIX, query)?;
        if !answer.is_empty() {
            writeln!(file, "{}{}", ANSWER_PREFIX, answer)?;
        }
        if !setup.is_empty() {
            writeln!(file, "{}{}", SETUP_PREFIX, setup)?;
        }
        writeln!(file)?;
        Ok(())
    }

    /// Query history in log order; `limit == 0` means all entries.
    pub fn history(&self, document_set: &str, limit: usize) -> Result<Vec<UserQueryItem>> {
        let Some(root) = &self.root else {
            let memory = self.memory.lock().expect("query log lock poisoned");
            let items = memory.get(document_set).cloned().unwrap_or_default();
            if limit == 0 {
                return Ok(items);
            }
            return Ok(items.into_iter().take(limit).collect());
        };

        let path = Self::log_path(root, document_set);
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&path)?;

        let mut result = Vec::new();
        let mut query = String::new();
        let mut answer = String::new();
        for line in content.lines() {
            if let Some(rest) = line.strip_prefix(QUERY_PREFIX) {
                if !query.is_empty() {
                    result.push(UserQueryItem {
                        query: std::mem::take(&mut query),
                        answer: std::mem::take(&mut answer),
                    });
                    if limit > 0 && result.len() >= limit {
                        return Ok(result);
                    }
                }
                query = rest.to_string();
                answer.clear();
                continue;
            }
            if let Some(rest) = line.strip_prefix(ANSWER_PREFIX) {
                answer = rest.to_string();
            }
        }
        if !query.is_empty() {
            result.push(UserQueryItem { query, answer });
        }
        Ok(result)
    }

    pub fn history_queries(&self, document_set: &str, limit: usize) -> Result<Vec<String>> {
        Ok(self
            .history(document_set, limit)?
            .into_iter()
            .map(|item| item.query)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_roundtrip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = QueryLog::on_disk(dir.path());
        log.log_query("set", "first question", "first answer", "")
            .unwrap();
        log.log_query("set", "second question", "", "k=4").unwrap();
        log.log_query("set", "third question", "third answer", "")
            .unwrap();

        let history = log.history("set", 0).unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].query, "first question");
        assert_eq!(history[0].answer, "first answer");
        assert_eq!(history[1].answer, "");
        assert_eq!(history[2].query, "third question");
    }

    #[test]
    fn limit_caps_history() {
        let dir = tempfile::tempdir().unwrap();
        let log = QueryLog::on_disk(dir.path());
        for i in 0..5 {
            log.log_query("set", &format!("q{}", i), "a", "").unwrap();
        }
        let history = log.history("set", 2).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].query, "q0");
        assert_eq!(history[1].query, "q1");
    }

    #[test]
    fn sets_are_isolated() {
        let log = QueryLog::in_memory();
        log.log_query("a", "question a", "", "").unwrap();
        log.log_query("b", "question b", "", "").unwrap();
        assert_eq!(log.history_queries("a", 0).unwrap(), vec!["question a"]);
        assert_eq!(log.history_queries("b", 0).unwrap(), vec!["question b"]);
        assert!(log.history("c", 0).unwrap().is_empty());
    }

    #[test]
    fn missing_log_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let log = QueryLog::on_disk(dir.path());
        assert!(log.history("never-logged", 0).unwrap().is_empty());
    }
}
