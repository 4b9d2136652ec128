//! # VectorIndex
//!
//! In-process approximate nearest-neighbor index over CVE embeddings.
//!
//! This module wraps a [HNSW](https://arxiv.org/abs/1603.09320) index (`hora`
//! crate) with the bookkeeping the store needs: an internal-id ↔ CVE-id
//! mapping, dimension checks, and exact cosine re-ranking of the candidates
//! the graph returns.
//!
//! The index is **derived state**. The relational store owns the embeddings;
//! [`crate::db::Database`] feeds them in at open and after every mutation.
//! `hora` has no delete operation, so mutations mark the index dirty and the
//! next search regrows the graph over the live entries only — removed records
//! simply stop existing here, no tombstone filtering at query time.
//!
//! ## Quick Example
//! ```no_run
//! use vulnvault::vector_index::VectorIndex;
//!
//! # fn main() -> Result<(), vulnvault::error::VaultError> {
//! let mut index = VectorIndex::new(3);
//! index.insert("2023-1111", vec![1.0, 0.0, 0.0])?;
//! index.insert("2023-2222", vec![0.0, 1.0, 0.0])?;
//! let hits = index.search(&[0.9, 0.1, 0.0], 1)?;
//! assert_eq!(hits[0].0, "2023-1111");
//! # Ok(()) }
//! ```

use hora::core::ann_index::ANNIndex;
use hora::core::metrics::Metric;
use hora::index::hnsw_idx::HNSWIndex;
use hora::index::hnsw_params::HNSWParams;
use std::collections::HashMap;

use crate::error::{Result, VaultError};

struct IndexEntry {
    key: String,
    vector: Vec<f32>,
}

/// HNSW index keyed by CVE id, with lazy rebuild after mutations.
pub struct VectorIndex {
    /// ANN index for similarity search.
    index: HNSWIndex<f32, usize>,
    /// Dimensionality of vectors (1024 for E5-large).
    dimension: usize,
    /// Auto-incrementing internal ID counter.
    next_id: usize,
    /// Internal ID → (CVE id, vector).
    entries: HashMap<usize, IndexEntry>,
    /// CVE id → internal ID, for replace/remove.
    by_key: HashMap<String, usize>,
    /// Set by mutations; cleared by the rebuild in [`Self::search`].
    dirty: bool,
}

impl VectorIndex {
    /// Create an empty index for vectors of length `dimension`.
    pub fn new(dimension: usize) -> Self {
        Self {
            index: HNSWIndex::new(dimension, &HNSWParams::default()),
            dimension,
            next_id: 0,
            entries: HashMap::new(),
            by_key: HashMap::new(),
            dirty: false,
        }
    }

    /// Number of live vectors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register (or replace) the vector for a CVE id.
    ///
    /// # Errors
    /// [`VaultError::Index`] if `vector.len() != dimension`.
    pub fn insert(&mut self, key: &str, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VaultError::Index("dimension mismatch"));
        }
        if let Some(old_id) = self.by_key.remove(key) {
            self.entries.remove(&old_id);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            id,
            IndexEntry {
                key: key.to_string(),
                vector,
            },
        );
        self.by_key.insert(key.to_string(), id);
        self.dirty = true;
        Ok(())
    }

    /// Drop a CVE id from the index. Unknown keys are ignored.
    pub fn remove(&mut self, key: &str) {
        if let Some(id) = self.by_key.remove(key) {
            self.entries.remove(&id);
            self.dirty = true;
        }
    }

    /// Query for the `top_k` most similar CVE ids.
    ///
    /// Candidates come from the HNSW graph and are re-ranked with exact cosine
    /// distances, so the returned order is deterministic: descending
    /// similarity, ties broken by CVE id. Each hit is `(cve_id, similarity)`
    /// where `similarity = 1 − cosine_distance`.
    ///
    /// # Errors
    /// [`VaultError::Index`] if `vector.len() != dimension` or the graph
    /// cannot be (re)built.
    pub fn search(&mut self, vector: &[f32], top_k: usize) -> Result<Vec<(String, f32)>> {
        if vector.len() != self.dimension {
            return Err(VaultError::Index("dimension mismatch"));
        }
        if top_k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_built()?;

        let mut hits: Vec<(String, f32)> = self
            .index
            .search(vector, top_k)
            .into_iter()
            .filter_map(|id| self.entries.get(&id))
            .map(|entry| {
                (
                    entry.key.clone(),
                    Self::cosine_similarity(vector, &entry.vector),
                )
            })
            .collect();

        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Regrow the HNSW graph over the live entries if anything changed.
    fn ensure_built(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let mut index = HNSWIndex::new(self.dimension, &HNSWParams::default());
        for (id, entry) in &self.entries {
            index.add(&entry.vector, *id).map_err(VaultError::Index)?;
        }
        index
            .build(Metric::CosineSimilarity)
            .map_err(VaultError::Index)?;
        self.index = index;
        self.dirty = false;
        Ok(())
    }

    /// Cosine similarity between two equal-length vectors.
    ///
    /// Returns `0.0` when either vector has zero norm.
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}
