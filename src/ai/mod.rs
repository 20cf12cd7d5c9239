//! External AI services: embedding, vector search and LLM judgments.
//!
//! All three are injected as trait objects so the clustering and scoring
//! engines never touch a concrete backend, and tests can substitute fakes.

pub mod chroma;
pub mod memory;
pub mod ollama;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of an external embedding/vector-search/LLM call. Callers decide
/// whether this aborts the operation (clustering) or degrades to a neutral
/// default (scoring).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response from {service}: {detail}")]
    BadResponse {
        service: &'static str,
        detail: String,
    },
}

/// Metadata stored alongside every vector-store document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocMetadata {
    pub source: String,
    pub cluster_id: String,
    pub external_id: String,
    /// Unix seconds; drives the rolling admission-window filter.
    pub timestamp: i64,
    /// True for the canonical document of a cluster. Defaults to false when
    /// absent so documents written before the flag existed still decode.
    #[serde(default)]
    pub is_reference: bool,
}

/// A document to persist into the vector store.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: String,
    pub document: String,
    pub embedding: Vec<f32>,
    pub metadata: DocMetadata,
}

/// One nearest-neighbor hit.
#[derive(Debug, Clone)]
pub struct Neighbor {
    /// Cosine distance (0 = identical).
    pub distance: f32,
    pub document: String,
    pub metadata: DocMetadata,
}

/// A document returned by a metadata lookup.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub document: String,
    pub metadata: DocMetadata,
}

/// Similarity-search constraint; `min_timestamp` implements the rolling
/// admission window.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryFilter {
    pub min_timestamp: Option<i64>,
}

/// Metadata lookup constraint.
#[derive(Debug, Clone, Default)]
pub struct GetFilter {
    pub cluster_id: Option<String>,
    pub is_reference: Option<bool>,
}

/// Entity/criticality judgment over a reference document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentAnalysis {
    /// Impact of the involved entities, nominally 20–100.
    pub entity_score: f32,
    /// Semantic criticality, nominally 20–100.
    pub criticality_score: f32,
    /// True for commentary/opinion rather than objective reporting.
    pub is_opinion: bool,
}

#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a text. Deterministic for identical input within a session.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;
}

#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    async fn add(&self, doc: NewDocument) -> Result<(), ServiceError>;
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: QueryFilter,
    ) -> Result<Vec<Neighbor>, ServiceError>;
    async fn get(
        &self,
        filter: GetFilter,
        limit: usize,
    ) -> Result<Vec<StoredDocument>, ServiceError>;
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Binary judgment: do the two texts report the exact same event?
    /// Any failure is an `Err`; the clustering engine treats it as "no match".
    async fn same_event(&self, reference: &str, candidate: &str) -> Result<bool, ServiceError>;

    /// Entity-impact / criticality / opinion analysis of a reference document.
    async fn analyze(&self, text: &str) -> Result<ContentAnalysis, ServiceError>;
}

pub type DynEmbedder = Arc<dyn Embedder>;
pub type DynVectorIndex = Arc<dyn VectorIndex>;
pub type DynLlmClient = Arc<dyn LlmClient>;
