//! In-process vector index with cosine distance.
//!
//! Default backend when no vector-store URL is configured; volatile, so
//! clusters do not survive a restart. Also the index used by the test suite.

use std::sync::Mutex;

use super::{
    GetFilter, Neighbor, NewDocument, QueryFilter, ServiceError, StoredDocument, VectorIndex,
};

#[derive(Default)]
pub struct MemoryIndex {
    entries: Mutex<Vec<NewDocument>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("index mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cosine distance in [0, 2]; zero-norm vectors are treated as maximally far.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom <= f32::EPSILON {
        return 1.0;
    }
    1.0 - dot / denom
}

#[async_trait::async_trait]
impl VectorIndex for MemoryIndex {
    async fn add(&self, doc: NewDocument) -> Result<(), ServiceError> {
        self.entries.lock().expect("index mutex poisoned").push(doc);
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: QueryFilter,
    ) -> Result<Vec<Neighbor>, ServiceError> {
        let entries = self.entries.lock().expect("index mutex poisoned");
        let mut hits: Vec<Neighbor> = entries
            .iter()
            .filter(|e| match filter.min_timestamp {
                Some(min) => e.metadata.timestamp >= min,
                None => true,
            })
            .map(|e| Neighbor {
                distance: cosine_distance(embedding, &e.embedding),
                document: e.document.clone(),
                metadata: e.metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    async fn get(
        &self,
        filter: GetFilter,
        limit: usize,
    ) -> Result<Vec<StoredDocument>, ServiceError> {
        let entries = self.entries.lock().expect("index mutex poisoned");
        Ok(entries
            .iter()
            .filter(|e| {
                filter
                    .cluster_id
                    .as_deref()
                    .is_none_or(|c| e.metadata.cluster_id == c)
                    && filter
                        .is_reference
                        .is_none_or(|r| e.metadata.is_reference == r)
            })
            .take(limit)
            .map(|e| StoredDocument {
                document: e.document.clone(),
                metadata: e.metadata.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::DocMetadata;

    fn doc(cluster: &str, ts: i64, is_ref: bool, v: Vec<f32>) -> NewDocument {
        NewDocument {
            id: format!("{cluster}-{ts}"),
            document: format!("doc {cluster}"),
            embedding: v,
            metadata: DocMetadata {
                source: "test".into(),
                cluster_id: cluster.into(),
                external_id: format!("ext-{cluster}-{ts}"),
                timestamp: ts,
                is_reference: is_ref,
            },
        }
    }

    #[test]
    fn cosine_distance_basics() {
        assert!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[tokio::test]
    async fn query_respects_timestamp_window() {
        let idx = MemoryIndex::new();
        idx.add(doc("old", 100, true, vec![1.0, 0.0])).await.unwrap();
        idx.add(doc("new", 500, true, vec![1.0, 0.0])).await.unwrap();

        let hits = idx
            .query(&[1.0, 0.0], 5, QueryFilter { min_timestamp: Some(200) })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.cluster_id, "new");
    }

    #[tokio::test]
    async fn get_filters_by_cluster_and_reference_flag() {
        let idx = MemoryIndex::new();
        idx.add(doc("a", 1, true, vec![1.0, 0.0])).await.unwrap();
        idx.add(doc("a", 2, false, vec![0.9, 0.1])).await.unwrap();
        idx.add(doc("b", 3, true, vec![0.0, 1.0])).await.unwrap();

        let refs = idx
            .get(
                GetFilter {
                    cluster_id: Some("a".into()),
                    is_reference: Some(true),
                },
                10,
            )
            .await
            .unwrap();
        assert_eq!(refs.len(), 1);
        assert!(refs[0].metadata.is_reference);

        let all_a = idx
            .get(
                GetFilter {
                    cluster_id: Some("a".into()),
                    is_reference: None,
                },
                10,
            )
            .await
            .unwrap();
        assert_eq!(all_a.len(), 2);
    }
}
