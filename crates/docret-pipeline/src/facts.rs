//! Offline grouping of extracted facts by embedding similarity: k-means
//! over the rows of a pairwise cosine-distance matrix. Not on the query
//! path; shares the embedding collaborator with the index.

use anyhow::{anyhow, Result};
use docret_core::embeddings::Embedder;
use std::collections::BTreeMap;

const MAX_ITERATIONS: usize = 50;

/// Facts grouped into one named cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactCluster {
    pub name: String,
    pub facts: Vec<String>,
}

pub async fn cluster_facts(
    facts: &[String],
    cluster_count: usize,
    embedder: &dyn Embedder,
) -> Result<Vec<FactCluster>> {
    if facts.is_empty() || cluster_count == 0 {
        return Err(anyhow!("need at least one fact and one cluster"));
    }
    let k = cluster_count.min(facts.len());

    let embeddings = embedder.embed(facts).await?;
    let rows = cosine_distance_matrix(&embeddings);
    let labels = kmeans(&rows, k);

    let mut grouped: BTreeMap<usize, Vec<String>> = BTreeMap::new();
    for (fact, label) in facts.iter().zip(labels) {
        grouped.entry(label).or_default().push(fact.clone());
    }

    Ok(grouped
        .into_iter()
        .map(|(label, facts)| FactCluster {
            name: format!("Cluster {}", label),
            facts,
        })
        .collect())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn cosine_distance_matrix(embeddings: &[Vec<f32>]) -> Vec<Vec<f32>> {
    embeddings
        .iter()
        .map(|a| {
            embeddings
                .iter()
                .map(|b| 1.0 - cosine_similarity(a, b))
                .collect()
        })
        .collect()
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest_centroid(row: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_distance = f32::MAX;
    for (index, centroid) in centroids.iter().enumerate() {
        let distance = squared_distance(row, centroid);
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }
    best
}

/// Plain k-means with deterministic seeding: centroids start at evenly
/// spaced rows, so repeated runs over the same facts give the same
/// clusters.
fn kmeans(rows: &[Vec<f32>], k: usize) -> Vec<usize> {
    let dim = rows[0].len();
    let mut centroids: Vec<Vec<f32>> = (0..k).map(|i| rows[i * rows.len() / k].clone()).collect();
    let mut labels = vec![0usize; rows.len()];

    for _ in 0..MAX_ITERATIONS {
        let new_labels: Vec<usize> = rows
            .iter()
            .map(|row| nearest_centroid(row, &centroids))
            .collect();
        if new_labels == labels {
            break;
        }
        labels = new_labels;

        for (index, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&Vec<f32>> = rows
                .iter()
                .zip(&labels)
                .filter(|(_, label)| **label == index)
                .map(|(row, _)| row)
                .collect();
            if members.is_empty() {
                continue;
            }
            *centroid = (0..dim)
                .map(|d| members.iter().map(|m| m[d]).sum::<f32>() / members.len() as f32)
                .collect();
        }
    }
    labels
}
