//! Exact and near-duplicate detection over file records.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::record::FileRecord;

/// Files sharing one content hash. `files.len() == count >= 2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub content_hash: String,
    pub files: Vec<String>,
    pub count: usize,
    pub per_file_size: u64,
    pub total_waste_bytes: u64,
}

/// Two distinct files whose token sets overlap above the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarPair {
    pub first: String,
    pub second: String,
    pub similarity: f64,
}

impl SimilarPair {
    pub fn percent(&self) -> u32 {
        (self.similarity * 100.0).round() as u32
    }
}

/// Buckets of records keyed by content hash.
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    buckets: HashMap<String, Vec<Arc<FileRecord>>>,
    /// Insertion order, for deterministic pair enumeration.
    order: Vec<Arc<FileRecord>>,
}

impl DuplicateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a record, loading its content first if needed. Unreadable files
    /// are rejected and leave the index untouched.
    pub fn add(&mut self, record: Arc<FileRecord>) -> Result<()> {
        record.load_content()?;
        let Some(hash) = record.content_hash() else {
            return Ok(());
        };
        self.buckets
            .entry(hash.to_string())
            .or_default()
            .push(Arc::clone(&record));
        self.order.push(record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Groups sorted by wasted bytes descending, then by hash.
    pub fn find_exact_duplicates(&self) -> Vec<DuplicateGroup> {
        let mut groups: Vec<DuplicateGroup> = self
            .buckets
            .iter()
            .filter(|(_, records)| records.len() > 1)
            .map(|(hash, records)| {
                let per_file_size = records[0].size_bytes();
                let count = records.len();
                DuplicateGroup {
                    content_hash: hash.clone(),
                    files: records.iter().map(|r| r.path().to_string()).collect(),
                    count,
                    per_file_size,
                    total_waste_bytes: per_file_size * (count as u64 - 1),
                }
            })
            .collect();
        groups.sort_by(|a, b| {
            b.total_waste_bytes
                .cmp(&a.total_waste_bytes)
                .then_with(|| a.content_hash.cmp(&b.content_hash))
        });
        groups
    }

    /// Quadratic pass over every indexed pair. Byte-identical pairs are left
    /// to [`DuplicateIndex::find_exact_duplicates`].
    pub fn find_near_duplicates(&self, threshold: f64) -> Vec<SimilarPair> {
        let token_sets: Vec<HashSet<&str>> = self
            .order
            .iter()
            .map(|r| {
                r.load_content()
                    .map(|text| text.split_whitespace().collect())
                    .unwrap_or_default()
            })
            .collect();

        let mut pairs = Vec::new();
        for i in 0..self.order.len() {
            for j in (i + 1)..self.order.len() {
                if self.order[i].content_hash() == self.order[j].content_hash() {
                    continue;
                }
                let similarity = jaccard(&token_sets[i], &token_sets[j]);
                if similarity >= threshold {
                    pairs.push(SimilarPair {
                        first: self.order[i].path().to_string(),
                        second: self.order[j].path().to_string(),
                        similarity,
                    });
                }
            }
        }
        pairs.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.first.cmp(&b.first))
                .then_with(|| a.second.cmp(&b.second))
        });
        debug!(
            files = self.order.len(),
            pairs = pairs.len(),
            threshold,
            "near-duplicate pass complete"
        );
        pairs
    }
}

/// `|A ∩ B| / |A ∪ B|`; two empty sets score 0.
pub fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
