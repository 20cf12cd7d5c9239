//! Thin REST client for a Chroma vector store (cosine space).
//!
//! One collection holds every ingested document, partitioned logically by the
//! `cluster_id` metadata key. The collection id is resolved once at startup
//! via get-or-create.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    DocMetadata, GetFilter, Neighbor, NewDocument, QueryFilter, ServiceError, StoredDocument,
    VectorIndex,
};

pub struct ChromaIndex {
    http: reqwest::Client,
    base_url: String,
    collection_id: String,
}

#[derive(Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    distances: Vec<Vec<f32>>,
    #[serde(default)]
    metadatas: Vec<Vec<Option<Value>>>,
    #[serde(default)]
    documents: Vec<Vec<Option<String>>>,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(default)]
    metadatas: Vec<Option<Value>>,
    #[serde(default)]
    documents: Vec<Option<String>>,
}

fn parse_metadata(value: Option<Value>) -> Result<DocMetadata, ServiceError> {
    let value = value.ok_or_else(|| ServiceError::BadResponse {
        service: "chroma",
        detail: "missing document metadata".into(),
    })?;
    serde_json::from_value(value).map_err(|e| ServiceError::BadResponse {
        service: "chroma",
        detail: e.to_string(),
    })
}

impl ChromaIndex {
    /// Connect and resolve (or create) the named collection.
    pub async fn connect(base_url: &str, collection: &str) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(8))
            .build()
            .expect("reqwest client");
        let base_url = base_url.trim_end_matches('/').to_string();

        let resp = http
            .post(format!("{base_url}/api/v1/collections"))
            .json(&json!({
                "name": collection,
                "get_or_create": true,
                "metadata": {"hnsw:space": "cosine"},
            }))
            .send()
            .await?
            .error_for_status()?;
        let info: CollectionInfo = resp.json().await?;

        Ok(Self {
            http,
            base_url,
            collection_id: info.id,
        })
    }

    fn endpoint(&self, op: &str) -> String {
        format!(
            "{}/api/v1/collections/{}/{op}",
            self.base_url, self.collection_id
        )
    }

    fn get_where(filter: &GetFilter) -> Option<Value> {
        match (&filter.cluster_id, filter.is_reference) {
            (Some(c), Some(r)) => Some(json!({
                "$and": [{"cluster_id": c}, {"is_reference": r}]
            })),
            (Some(c), None) => Some(json!({ "cluster_id": c })),
            (None, Some(r)) => Some(json!({ "is_reference": r })),
            (None, None) => None,
        }
    }
}

#[async_trait::async_trait]
impl VectorIndex for ChromaIndex {
    async fn add(&self, doc: NewDocument) -> Result<(), ServiceError> {
        let body = json!({
            "ids": [doc.id],
            "embeddings": [doc.embedding],
            "documents": [doc.document],
            "metadatas": [doc.metadata],
        });
        self.http
            .post(self.endpoint("add"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: QueryFilter,
    ) -> Result<Vec<Neighbor>, ServiceError> {
        let mut body = json!({
            "query_embeddings": [embedding],
            "n_results": k,
            "include": ["metadatas", "distances", "documents"],
        });
        if let Some(min) = filter.min_timestamp {
            body["where"] = json!({ "timestamp": { "$gte": min } });
        }

        let resp = self
            .http
            .post(self.endpoint("query"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let parsed: QueryResponse = resp.json().await?;

        // Single query vector, so only the first result row matters.
        let distances = parsed.distances.into_iter().next().unwrap_or_default();
        let metadatas = parsed.metadatas.into_iter().next().unwrap_or_default();
        let documents = parsed.documents.into_iter().next().unwrap_or_default();

        let mut hits = Vec::with_capacity(distances.len());
        for ((distance, metadata), document) in distances
            .into_iter()
            .zip(metadatas.into_iter())
            .zip(documents.into_iter())
        {
            hits.push(Neighbor {
                distance,
                document: document.unwrap_or_default(),
                metadata: parse_metadata(metadata)?,
            });
        }
        Ok(hits)
    }

    async fn get(
        &self,
        filter: GetFilter,
        limit: usize,
    ) -> Result<Vec<StoredDocument>, ServiceError> {
        let mut body = json!({
            "limit": limit,
            "include": ["metadatas", "documents"],
        });
        if let Some(where_clause) = Self::get_where(&filter) {
            body["where"] = where_clause;
        }

        let resp = self
            .http
            .post(self.endpoint("get"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let parsed: GetResponse = resp.json().await?;

        let mut docs = Vec::with_capacity(parsed.documents.len());
        for (document, metadata) in parsed.documents.into_iter().zip(parsed.metadatas) {
            docs.push(StoredDocument {
                document: document.unwrap_or_default(),
                metadata: parse_metadata(metadata)?,
            });
        }
        Ok(docs)
    }
}
