use anyhow::{anyhow, Result};
use arrow::array::{
    ArrayRef, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use docret_core::embeddings::Embedder;
use docret_core::models::{Chunk, Metadata};
use indicatif::ProgressBar;
use lance::dataset::{Dataset, WriteMode, WriteParams};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

const COLLECTION_DIR: &str = "chunks.lance";
const EMBED_BATCH: usize = 64;

/// A chunk as stored in and returned by the nearest-neighbor backend.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
struct MemRecord {
    embedding: Vec<f32>,
    chunk: StoredChunk,
}

enum Backend {
    Disk(PathBuf),
    Memory(Mutex<HashMap<(String, String), Vec<MemRecord>>>),
}

/// One embedded collection per `(document_set, index_name)`. Builds are
/// full rebuilds: the existing collection is removed before anything new is
/// written, so a collection can never disagree with its declared embedding.
/// Both backends report similarity as `1 / (1 + L2 distance)` — higher is
/// better — so they rank identical inputs identically.
pub struct VectorIndex {
    backend: Backend,
}

impl VectorIndex {
    pub fn on_disk(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::Disk(root.into()),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Mutex::new(HashMap::new())),
        }
    }

    fn collection_dir(root: &Path, document_set: &str, index_name: &str) -> PathBuf {
        root.join(document_set).join(index_name).join(COLLECTION_DIR)
    }

    /// Embed and store the full chunk set. Failures are appended to the
    /// returned log rather than raised; callers inspect the log.
    pub async fn build(
        &self,
        document_set: &str,
        index_name: &str,
        chunks: &[Chunk],
        embedder: &dyn Embedder,
    ) -> Vec<String> {
        let mut log = Vec::new();
        log.push(format!("Total count of chunks {}", chunks.len()));

        if let Err(err) = self.delete(document_set, index_name) {
            log.push(format!("Error: failed to clear existing index: {}", err));
            return log;
        }
        if chunks.is_empty() {
            log.push("Nothing to index".to_string());
            return log;
        }

        let embeddings = match embed_all(embedder, chunks).await {
            Ok(embeddings) => embeddings,
            Err(err) => {
                log.push(format!("Error: embedding failed: {}", err));
                return log;
            }
        };

        match &self.backend {
            Backend::Memory(collections) => {
                let records = chunks
                    .iter()
                    .zip(embeddings)
                    .map(|(chunk, embedding)| MemRecord {
                        embedding,
                        chunk: StoredChunk {
                            id: chunk.id.clone(),
                            content: chunk.content.clone(),
                            metadata: chunk.metadata.clone(),
                        },
                    })
                    .collect();
                let mut collections = collections.lock().expect("vector index lock poisoned");
                collections.insert(
                    (document_set.to_string(), index_name.to_string()),
                    records,
                );
                log.push("Index has been stored in memory".to_string());
            }
            Backend::Disk(root) => {
                let dir = Self::collection_dir(root, document_set, index_name);
                match write_dataset(&dir, chunks, &embeddings).await {
                    Ok(()) => log.push("Index has been stored on disk".to_string()),
                    Err(err) => log.push(format!("Error: failed to write index: {}", err)),
                }
            }
        }

        info!(
            "built index {}/{} with {} chunks",
            document_set,
            index_name,
            chunks.len()
        );
        log
    }

    /// Top-k nearest chunks for the query vector, best first.
    pub async fn search(
        &self,
        document_set: &str,
        index_name: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(f32, StoredChunk)>> {
        match &self.backend {
            Backend::Memory(collections) => {
                let collections = collections.lock().expect("vector index lock poisoned");
                let records = collections
                    .get(&(document_set.to_string(), index_name.to_string()))
                    .ok_or_else(|| {
                        anyhow!("index '{}/{}' not found", document_set, index_name)
                    })?;

                let mut scored: Vec<(f32, StoredChunk)> = records
                    .iter()
                    .map(|record| {
                        let distance = l2_distance(&record.embedding, query);
                        (1.0 / (1.0 + distance), record.chunk.clone())
                    })
                    .collect();
                scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
                scored.truncate(k);
                Ok(scored)
            }
            Backend::Disk(root) => {
                let dir = Self::collection_dir(root, document_set, index_name);
                if !dir.exists() {
                    return Err(anyhow!("index '{}/{}' not found", document_set, index_name));
                }
                search_dataset(&dir, query, k).await
            }
        }
    }

    /// Remove the collection for the key; missing collections are fine.
    pub fn delete(&self, document_set: &str, index_name: &str) -> Result<()> {
        match &self.backend {
            Backend::Memory(collections) => {
                let mut collections = collections.lock().expect("vector index lock poisoned");
                collections.remove(&(document_set.to_string(), index_name.to_string()));
                Ok(())
            }
            Backend::Disk(root) => {
                let dir = Self::collection_dir(root, document_set, index_name);
                if dir.exists() {
                    std::fs::remove_dir_all(&dir)?;
                }
                Ok(())
            }
        }
    }

    /// Stored chunk count, for rebuild checks and status output.
    pub async fn count(&self, document_set: &str, index_name: &str) -> Result<usize> {
        match &self.backend {
            Backend::Memory(collections) => {
                let collections = collections.lock().expect("vector index lock poisoned");
                Ok(collections
                    .get(&(document_set.to_string(), index_name.to_string()))
                    .map(|records| records.len())
                    .unwrap_or(0))
            }
            Backend::Disk(root) => {
                let dir = Self::collection_dir(root, document_set, index_name);
                if !dir.exists() {
                    return Ok(0);
                }
                let dataset = Dataset::open(dir.to_str().unwrap_or_default()).await?;
                Ok(dataset.count_rows(None).await?)
            }
        }
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

async fn embed_all(embedder: &dyn Embedder, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let bar = ProgressBar::new(texts.len() as u64);
    let mut out = Vec::with_capacity(texts.len());
    for batch in texts.chunks(EMBED_BATCH) {
        let embedded = embedder.embed(batch).await?;
        if embedded.len() != batch.len() {
            bar.finish_and_clear();
            return Err(anyhow!(
                "embedding count mismatch: got {}, expected {}",
                embedded.len(),
                batch.len()
            ));
        }
        out.extend(embedded);
        bar.inc(batch.len() as u64);
    }
    bar.finish_and_clear();
    Ok(out)
}

async fn write_dataset(dir: &Path, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
    let embedding_dim = embeddings
        .first()
        .map(|e| e.len())
        .ok_or_else(|| anyhow!("no embeddings to write"))?;

    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new(
            "embedding",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                embedding_dim as i32,
            ),
            false,
        ),
    ]));

    let ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
    let contents: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let metadatas: Vec<String> = chunks
        .iter()
        .map(|c| serde_json::to_string(&c.metadata))
        .collect::<Result<_, _>>()?;
    let flat: Vec<f32> = embeddings.iter().flatten().copied().collect();

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(ids)) as ArrayRef,
            Arc::new(StringArray::from(contents)) as ArrayRef,
            Arc::new(StringArray::from(metadatas)) as ArrayRef,
            {
                let values = Float32Array::from(flat);
                let field = Arc::new(Field::new("item", DataType::Float32, true));
                Arc::new(FixedSizeListArray::new(
                    field,
                    embedding_dim as i32,
                    Arc::new(values),
                    None,
                )) as ArrayRef
            },
        ],
    )?;

    if let Some(parent) = dir.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let reader = RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema);
    Dataset::write(
        reader,
        dir.to_str()
            .ok_or_else(|| anyhow!("non-utf8 index path: {:?}", dir))?,
        Some(WriteParams {
            mode: WriteMode::Create,
            ..Default::default()
        }),
    )
    .await?;
    Ok(())
}

async fn search_dataset(dir: &Path, query: &[f32], k: usize) -> Result<Vec<(f32, StoredChunk)>> {
    let dataset = Dataset::open(
        dir.to_str()
            .ok_or_else(|| anyhow!("non-utf8 index path: {:?}", dir))?,
    )
    .await?;

    let query_array = Float32Array::from(query.to_vec());
    let results = dataset
        .scan()
        .nearest("embedding", &query_array, k)?
        .try_into_stream()
        .await?;

    use futures::stream::TryStreamExt;
    let batches: Vec<RecordBatch> = results
        .try_collect()
        .await
        .map_err(|e| anyhow!("Failed to collect search results: {}", e))?;

    let mut scored = Vec::new();
    for batch in batches {
        let ids = string_column(&batch, "id")?;
        let contents = string_column(&batch, "content")?;
        let metadatas = string_column(&batch, "metadata")?;
        let distances = batch
            .column_by_name("_distance")
            .ok_or_else(|| anyhow!("Missing _distance column"))?
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| anyhow!("Failed to cast _distance column"))?;

        for i in 0..batch.num_rows() {
            let metadata: Metadata = serde_json::from_str(metadatas.value(i)).unwrap_or_default();
            let distance = distances.value(i);
            scored.push((
                1.0 / (1.0 + distance),
                StoredChunk {
                    id: ids.value(i).to_string(),
                    content: contents.value(i).to_string(),
                    metadata,
                },
            ));
        }
    }

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    Ok(scored)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| anyhow!("Missing {} column", name))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow!("Failed to cast {} column", name))
}
