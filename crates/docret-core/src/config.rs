use crate::models::IndexParams;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(None)
    }

    pub fn load_from(path: Option<&std::path::Path>) -> anyhow::Result<Self> {
        let config_path = path.unwrap_or_else(|| std::path::Path::new(".docret.yml"));
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = serde_yaml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub params: IndexParams,
    /// Literal separator used by the fact-list splitter.
    #[serde(default = "default_fact_separator")]
    pub fact_separator: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            params: IndexParams::default(),
            fact_separator: default_fact_separator(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    /// `0.0` means "no threshold"; any other value filters results below it.
    #[serde(default)]
    pub score_threshold: f32,
    #[serde(default)]
    pub llm_rescoring: bool,
    #[serde(default = "default_llm_threshold")]
    pub llm_threshold: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            score_threshold: 0.0,
            llm_rescoring: false,
            llm_threshold: default_llm_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    External,
    Ollama,
}

impl EmbeddingBackend {
    /// Stable registry name persisted into index metadata.
    pub fn name(&self) -> &'static str {
        match self {
            EmbeddingBackend::External => "openai",
            EmbeddingBackend::Ollama => "ollama",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    pub backend: EmbeddingBackend,
    #[serde(default)]
    pub model_name: String,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Ollama,
            model_name: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: default_llm_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: std::path::PathBuf,
    /// Ephemeral mode: collections and stores live in memory only.
    #[serde(default)]
    pub in_memory: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            in_memory: false,
        }
    }
}

fn default_fact_separator() -> String {
    "\n\n".to_string()
}

fn default_top_k() -> usize {
    4
}

fn default_llm_threshold() -> f32 {
    0.5
}

fn default_llm_max_tokens() -> usize {
    1000
}

fn default_storage_root() -> std::path::PathBuf {
    std::path::PathBuf::from(".docret")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_from(Some(std::path::Path::new("no-such-file.yml"))).unwrap();
        assert_eq!(config.search.default_top_k, 4);
        assert_eq!(config.search.score_threshold, 0.0);
        assert!(!config.storage.in_memory);
    }

    #[test]
    fn partial_yaml_keeps_defaults_for_the_rest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "search:\n  default_top_k: 9\nembeddings:\n  backend: external\n"
        )
        .unwrap();
        let config = Config::load_from(Some(file.path())).unwrap();
        assert_eq!(config.search.default_top_k, 9);
        assert_eq!(config.embeddings.backend, EmbeddingBackend::External);
        assert_eq!(config.index.params.tokens_per_chunk, 256);
    }
}
