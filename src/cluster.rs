//! Semantic clustering engine.
//!
//! Decides, for each incoming item, whether it belongs to an existing trend
//! or starts a new one. Admission candidates come from a nearest-neighbor
//! query restricted to a rolling time window, so "same story, much later"
//! items cannot false-join a stale cluster; borderline candidates are
//! confirmed against the cluster's reference document by an LLM judgment,
//! fail-closed (inability to confirm means "not a match").

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::ai::{
    DocMetadata, DynEmbedder, DynLlmClient, DynVectorIndex, GetFilter, NewDocument, QueryFilter,
    ServiceError,
};
use crate::config::ClusterConfig;
use crate::model::{Category, NewRawNews};
use crate::sources::SourceTiers;
use crate::store::{AttachOutcome, Store};
use crate::text::{clean_text, is_spam};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_spam_total", "Items dropped by the spam gate.");
        describe_counter!(
            "ingest_rejected_total",
            "Items rejected by the admission length gate."
        );
        describe_counter!(
            "ingest_dedup_total",
            "Items dropped by external-id deduplication."
        );
        describe_counter!("trends_created_total", "New trend clusters minted.");
        describe_counter!("trend_joins_total", "Items joined to existing trends.");
        describe_counter!(
            "cluster_llm_checks_total",
            "LLM match-judgment calls issued during admission."
        );
    });
}

/// Outcome of cluster admission for one item.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub cluster_id: String,
    /// True when the item joined an existing cluster.
    pub joined_existing: bool,
}

pub struct ClusterEngine {
    embedder: DynEmbedder,
    index: DynVectorIndex,
    llm: DynLlmClient,
    store: Arc<dyn Store>,
    tiers: SourceTiers,
    cfg: ClusterConfig,
}

impl ClusterEngine {
    pub fn new(
        embedder: DynEmbedder,
        index: DynVectorIndex,
        llm: DynLlmClient,
        store: Arc<dyn Store>,
        tiers: SourceTiers,
        cfg: ClusterConfig,
    ) -> Self {
        ensure_metrics_described();
        Self {
            embedder,
            index,
            llm,
            store,
            tiers,
            cfg,
        }
    }

    /// The canonical text for a cluster: the document flagged as reference,
    /// or the first document found for that cluster.
    pub async fn reference_doc(&self, cluster_id: &str) -> Result<Option<String>, ServiceError> {
        let flagged = self
            .index
            .get(
                GetFilter {
                    cluster_id: Some(cluster_id.to_string()),
                    is_reference: Some(true),
                },
                1,
            )
            .await?;
        if let Some(doc) = flagged.into_iter().next() {
            return Ok(Some(doc.document));
        }

        let fallback = self
            .index
            .get(
                GetFilter {
                    cluster_id: Some(cluster_id.to_string()),
                    is_reference: None,
                },
                1,
            )
            .await?;
        Ok(fallback.into_iter().next().map(|d| d.document))
    }

    /// Nearby clusters for the "related trends" surface. Unlike admission this
    /// query is unrestricted, so it can reach arbitrarily far back in time.
    pub async fn related_trends(
        &self,
        cluster_id: &str,
        limit: usize,
    ) -> Result<Vec<String>, ServiceError> {
        let Some(reference) = self.reference_doc(cluster_id).await? else {
            return Ok(Vec::new());
        };
        let vector = self.embedder.embed(&reference).await?;
        let hits = self
            .index
            .query(&vector, limit + 10, QueryFilter::default())
            .await?;

        let mut seen: HashSet<String> = HashSet::from([cluster_id.to_string()]);
        let mut related = Vec::new();
        for hit in hits {
            if seen.insert(hit.metadata.cluster_id.clone()) {
                related.push(hit.metadata.cluster_id);
            }
            if related.len() >= limit {
                break;
            }
        }
        Ok(related)
    }

    /// Cluster admission for one cleaned text. Returns `None` when the text is
    /// below the admission length; otherwise the cluster id this item landed
    /// in. Any embedding/vector-store failure aborts with no writes.
    pub async fn assign(
        &self,
        cleaned: &str,
        source: &str,
        external_id: &str,
    ) -> Result<Option<Assignment>, ServiceError> {
        if cleaned.chars().count() < self.cfg.min_text_len {
            counter!("ingest_rejected_total").increment(1);
            return Ok(None);
        }

        let vector = self.embedder.embed(cleaned).await?;

        let now = Utc::now();
        let window_start = (now - Duration::hours(self.cfg.window_hours)).timestamp();
        let neighbors = self
            .index
            .query(
                &vector,
                self.cfg.neighbors,
                QueryFilter {
                    min_timestamp: Some(window_start),
                },
            )
            .await?;

        let mut cluster_id: Option<String> = None;
        let mut checked: HashSet<String> = HashSet::new();

        for neighbor in &neighbors {
            if neighbor.distance > self.cfg.accept_ceiling {
                continue;
            }
            let candidate = neighbor.metadata.cluster_id.clone();
            if !checked.insert(candidate.clone()) {
                continue;
            }

            // Near-identical text is a repost; accept without LLM review.
            if neighbor.distance < self.cfg.duplicate_ceiling {
                cluster_id = Some(candidate);
                break;
            }

            let target = self
                .reference_doc(&candidate)
                .await?
                .unwrap_or_else(|| neighbor.document.clone());

            counter!("cluster_llm_checks_total").increment(1);
            match self.llm.same_event(&target, cleaned).await {
                Ok(true) => {
                    cluster_id = Some(candidate);
                    break;
                }
                Ok(false) => {}
                Err(e) => {
                    // Fail-closed: prefer over-splitting to false-merging.
                    warn!(cluster = %candidate, error = %e, "match judgment failed; treating as no match");
                }
            }
        }

        let (cluster_id, joined_existing) = match cluster_id {
            Some(id) => (id, true),
            None => (Uuid::new_v4().to_string(), false),
        };

        self.index
            .add(NewDocument {
                id: Uuid::new_v4().to_string(),
                document: cleaned.to_string(),
                embedding: vector,
                metadata: DocMetadata {
                    source: source.to_string(),
                    cluster_id: cluster_id.clone(),
                    external_id: external_id.to_string(),
                    timestamp: now.timestamp(),
                    is_reference: !joined_existing,
                },
            })
            .await?;

        Ok(Some(Assignment {
            cluster_id,
            joined_existing,
        }))
    }

    /// The collector contract: submit one candidate item. Runs the spam gate,
    /// normalization, external-id dedup, cluster admission, and persists the
    /// item + arrival, raising the trend's `needs_scoring` flag. Returns the
    /// cluster id, or `None` when the item was rejected or dropped.
    pub async fn submit_candidate(
        &self,
        raw_text: &str,
        source_name: &str,
        external_id: &str,
    ) -> anyhow::Result<Option<String>> {
        if is_spam(raw_text) {
            counter!("ingest_spam_total").increment(1);
            debug!(source = source_name, "dropped spam/noise item");
            return Ok(None);
        }

        let cleaned = clean_text(raw_text);

        if self.store.has_external_id(external_id) {
            counter!("ingest_dedup_total").increment(1);
            return Ok(None);
        }

        let assignment = match self.assign(&cleaned, source_name, external_id).await {
            Ok(Some(a)) => a,
            Ok(None) => return Ok(None),
            Err(e) => {
                // Admission aborted; no partial state was created.
                warn!(source = source_name, error = %e, "cluster admission aborted");
                return Ok(None);
            }
        };

        let now = Utc::now();
        let news = NewRawNews {
            source_name: source_name.to_string(),
            source_tier: self.tiers.tier_for(source_name),
            external_id: external_id.to_string(),
            content: cleaned.clone(),
            published_at: now,
        };

        match self.store.attach(
            &assignment.cluster_id,
            &cleaned,
            Category::default(),
            news,
            now,
        ) {
            Ok(AttachOutcome::Created(trend_id)) => {
                counter!("trends_created_total").increment(1);
                info!(trend = trend_id, cluster = %assignment.cluster_id, "new trend created");
            }
            Ok(AttachOutcome::Joined(trend_id)) => {
                counter!("trend_joins_total").increment(1);
                debug!(trend = trend_id, cluster = %assignment.cluster_id, "item joined trend");
            }
            Ok(AttachOutcome::Duplicate) => {
                counter!("ingest_dedup_total").increment(1);
                return Ok(None);
            }
            Err(e) => {
                // Accepted data-loss boundary: the vector store already holds
                // the document, but the relational side failed. Log and drop.
                error!(cluster = %assignment.cluster_id, error = %e, "failed to persist ingested item");
                return Ok(None);
            }
        }

        Ok(Some(assignment.cluster_id))
    }
}
