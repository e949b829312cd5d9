// src/intent/centroids.rs — Per-intent centroid embeddings and their on-disk cache

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{examples, Intent};

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Element-wise mean. `None` for no vectors or mismatched dimensions.
pub fn mean_vector(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let dim = vectors.first()?.len();
    if dim == 0 || vectors.iter().any(|v| v.len() != dim) {
        return None;
    }
    let mut sum = vec![0.0f32; dim];
    for v in vectors {
        for (acc, x) in sum.iter_mut().zip(v) {
            *acc += x;
        }
    }
    let n = vectors.len() as f32;
    Some(sum.into_iter().map(|x| x / n).collect())
}

/// One centroid per classifiable intent, in [`Intent::CLASSIFIABLE`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct Centroids {
    entries: Vec<(Intent, Vec<f32>)>,
}

impl Centroids {
    /// Build from per-intent vectors. Every classifiable intent must be present
    /// exactly once, with non-empty vectors of one shared dimension.
    pub fn new(mut by_intent: BTreeMap<Intent, Vec<f32>>) -> Option<Self> {
        if by_intent.len() != Intent::CLASSIFIABLE.len() {
            return None;
        }
        let mut entries = Vec::with_capacity(Intent::CLASSIFIABLE.len());
        for intent in Intent::CLASSIFIABLE {
            entries.push((intent, by_intent.remove(&intent)?));
        }
        let dim = entries[0].1.len();
        if dim == 0 || entries.iter().any(|(_, v)| v.len() != dim) {
            return None;
        }
        Some(Self { entries })
    }

    pub fn dimension(&self) -> usize {
        self.entries.first().map(|(_, v)| v.len()).unwrap_or(0)
    }

    /// Highest-scoring intent and its score. Ties keep the earlier intent.
    pub fn best(&self, embedding: &[f32]) -> (Intent, f32) {
        let mut best = (Intent::Other, f32::NEG_INFINITY);
        for (intent, centroid) in &self.entries {
            let score = cosine_similarity(embedding, centroid);
            if score > best.1 {
                best = (*intent, score);
            }
        }
        best
    }

    /// The best intent if it reaches `threshold`, else [`Intent::Other`].
    pub fn classify(&self, embedding: &[f32], threshold: f32) -> Intent {
        let (best, score) = self.best(embedding);
        let intent = if score >= threshold { best } else { Intent::Other };
        tracing::debug!(intent = %intent, best = %best, score, "Classified message");
        intent
    }
}

/// On-disk form of [`Centroids`].
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    model: String,
    fingerprint: String,
    centroids: BTreeMap<String, Vec<f32>>,
}

/// Load cached centroids. Returns `None` when the file is missing, unreadable,
/// or was written for another model or example set.
pub fn load_cache(path: &Path, model: &str) -> Option<Centroids> {
    let content = std::fs::read_to_string(path).ok()?;
    let cache: CacheFile = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Ignoring unreadable intent cache: {e}");
            return None;
        }
    };
    if cache.model != model || cache.fingerprint != examples::fingerprint() {
        tracing::info!(path = %path.display(), "Intent cache is stale, recomputing");
        return None;
    }

    let mut by_intent = BTreeMap::new();
    for (name, vector) in cache.centroids {
        let intent: Intent = name.parse().ok()?;
        by_intent.insert(intent, vector);
    }
    Centroids::new(by_intent)
}

pub fn save_cache(path: &Path, model: &str, centroids: &Centroids) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let cache = CacheFile {
        model: model.to_string(),
        fingerprint: examples::fingerprint(),
        centroids: centroids
            .entries
            .iter()
            .map(|(intent, v)| (intent.as_str().to_string(), v.clone()))
            .collect(),
    };
    std::fs::write(path, serde_json::to_string(&cache)?)?;
    Ok(())
}
