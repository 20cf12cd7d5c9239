//! Trend/RawNews/Arrival persistence.
//!
//! The `Store` trait is the seam between the engines and whatever durable
//! backend a deployment uses; every method is a single atomic unit. The decay
//! write additionally carries the sweep's `last_updated` snapshot and is
//! skipped when a scoring commit landed in between, so the sweep's
//! read-then-write can never clobber a fresh score. `MemoryStore` is the
//! reference implementation: one mutex over the whole state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use crate::model::{
    Category, NewRawNews, RawNews, RawNewsId, Trajectory, Trend, TrendArrival, TrendId,
};

/// Result of attaching one ingested item to the trend graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// A new trend was minted for this cluster id.
    Created(TrendId),
    /// The item joined an existing trend.
    Joined(TrendId),
    /// The external id was already ingested; nothing was written.
    Duplicate,
}

/// Everything a completed scoring cycle writes back, committed atomically.
#[derive(Debug, Clone, Copy)]
pub struct ScoreUpdate {
    pub signal: f32,
    pub confidence: f32,
    pub final_tps: f32,
    pub trajectory: Trajectory,
    pub scored_at: DateTime<Utc>,
}

pub trait Store: Send + Sync {
    /// Persist one item: dedup on `external_id`, upsert the trend for
    /// `cluster_id`, append the arrival, raise `needs_scoring`.
    fn attach(
        &self,
        cluster_id: &str,
        title: &str,
        category: Category,
        news: NewRawNews,
        now: DateTime<Utc>,
    ) -> Result<AttachOutcome>;

    /// True if an item with this external id was already ingested.
    fn has_external_id(&self, external_id: &str) -> bool;

    fn trend(&self, id: TrendId) -> Option<Trend>;
    fn trend_by_cluster(&self, cluster_id: &str) -> Option<Trend>;

    /// All arrivals for a trend, oldest first.
    fn arrivals(&self, trend_id: TrendId) -> Vec<TrendArrival>;

    /// The `n` most recent arrivals, newest first.
    fn recent_arrivals(&self, trend_id: TrendId, n: usize) -> Vec<TrendArrival>;

    fn news_for(&self, trend_id: TrendId) -> Vec<RawNews>;

    /// Active trends flagged `needs_scoring`, capped at `limit`.
    fn pending(&self, limit: usize) -> Vec<TrendId>;

    /// Commit one scoring cycle: snapshot `previous_tps`, write the score
    /// fields and `last_updated`, clear `needs_scoring`. Whole-or-nothing; on
    /// error the flag stays set and the trend is retried next sweep.
    fn commit_scores(&self, trend_id: TrendId, update: ScoreUpdate) -> Result<()>;

    /// Active trends with `final_tps` above `floor`, for the decay sweep.
    fn decay_candidates(&self, floor: f32) -> Vec<Trend>;

    /// Write a decayed score (and its legacy mirror) computed from a snapshot
    /// taken when the trend's `last_updated` was `seen_updated`. Returns
    /// `false` without writing when the trend was rescored after that
    /// snapshot or is already inactive. Does not touch `last_updated`.
    /// `deactivate` flips the trend out of all future scoring/decay.
    fn apply_decay(
        &self,
        trend_id: TrendId,
        new_score: f32,
        deactivate: bool,
        seen_updated: DateTime<Utc>,
    ) -> Result<bool>;

    /// Reassign a trend's category (set by the out-of-core summarizer in the
    /// full system; exposed here so operators and tests can steer decay).
    fn set_category(&self, trend_id: TrendId, category: Category) -> Result<()>;
}

#[derive(Default)]
struct Inner {
    trends: BTreeMap<TrendId, Trend>,
    news: BTreeMap<RawNewsId, RawNews>,
    arrivals: Vec<TrendArrival>,
    by_cluster: HashMap<String, TrendId>,
    by_external: HashMap<String, RawNewsId>,
    next_trend_id: TrendId,
    next_news_id: RawNewsId,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("store mutex poisoned")
    }
}

impl Store for MemoryStore {
    fn attach(
        &self,
        cluster_id: &str,
        title: &str,
        category: Category,
        news: NewRawNews,
        now: DateTime<Utc>,
    ) -> Result<AttachOutcome> {
        let mut inner = self.lock();

        if inner.by_external.contains_key(&news.external_id) {
            return Ok(AttachOutcome::Duplicate);
        }

        let (trend_id, outcome) = match inner.by_cluster.get(cluster_id).copied() {
            Some(id) => {
                let trend = inner
                    .trends
                    .get_mut(&id)
                    .expect("cluster map points at missing trend");
                trend.message_count += 1;
                trend.last_updated = now;
                trend.needs_scoring = true;
                (id, AttachOutcome::Joined(id))
            }
            None => {
                inner.next_trend_id += 1;
                let id = inner.next_trend_id;
                let trend = Trend {
                    id,
                    cluster_id: cluster_id.to_string(),
                    title: Some(title.chars().take(120).collect::<String>().trim().to_string()),
                    category,
                    message_count: 1,
                    score: 0.0,
                    tps_signal: 0.0,
                    tps_confidence: 0.0,
                    final_tps: 0.0,
                    previous_tps: 0.0,
                    trajectory: Trajectory::Steady,
                    needs_scoring: true,
                    first_seen: now,
                    last_updated: now,
                    is_active: true,
                };
                inner.trends.insert(id, trend);
                inner.by_cluster.insert(cluster_id.to_string(), id);
                (id, AttachOutcome::Created(id))
            }
        };

        inner.next_news_id += 1;
        let news_id = inner.next_news_id;
        let external_id = news.external_id.clone();
        inner.news.insert(
            news_id,
            RawNews {
                id: news_id,
                source_name: news.source_name,
                source_tier: news.source_tier,
                external_id: news.external_id,
                content: news.content,
                published_at: news.published_at,
                trend_id: Some(trend_id),
            },
        );
        inner.by_external.insert(external_id, news_id);
        inner.arrivals.push(TrendArrival {
            trend_id,
            raw_news_id: Some(news_id),
            timestamp: now,
        });

        Ok(outcome)
    }

    fn has_external_id(&self, external_id: &str) -> bool {
        self.lock().by_external.contains_key(external_id)
    }

    fn trend(&self, id: TrendId) -> Option<Trend> {
        self.lock().trends.get(&id).cloned()
    }

    fn trend_by_cluster(&self, cluster_id: &str) -> Option<Trend> {
        let inner = self.lock();
        inner
            .by_cluster
            .get(cluster_id)
            .and_then(|id| inner.trends.get(id))
            .cloned()
    }

    fn arrivals(&self, trend_id: TrendId) -> Vec<TrendArrival> {
        let inner = self.lock();
        let mut out: Vec<TrendArrival> = inner
            .arrivals
            .iter()
            .filter(|a| a.trend_id == trend_id)
            .cloned()
            .collect();
        out.sort_by_key(|a| a.timestamp);
        out
    }

    fn recent_arrivals(&self, trend_id: TrendId, n: usize) -> Vec<TrendArrival> {
        let mut out = self.arrivals(trend_id);
        out.reverse();
        out.truncate(n);
        out
    }

    fn news_for(&self, trend_id: TrendId) -> Vec<RawNews> {
        let inner = self.lock();
        inner
            .news
            .values()
            .filter(|n| n.trend_id == Some(trend_id))
            .cloned()
            .collect()
    }

    fn pending(&self, limit: usize) -> Vec<TrendId> {
        let inner = self.lock();
        inner
            .trends
            .values()
            .filter(|t| t.needs_scoring && t.is_active)
            .map(|t| t.id)
            .take(limit)
            .collect()
    }

    fn commit_scores(&self, trend_id: TrendId, update: ScoreUpdate) -> Result<()> {
        let mut inner = self.lock();
        let Some(trend) = inner.trends.get_mut(&trend_id) else {
            bail!("commit_scores: unknown trend {trend_id}");
        };
        trend.previous_tps = trend.final_tps;
        trend.tps_signal = update.signal;
        trend.tps_confidence = update.confidence;
        trend.final_tps = update.final_tps;
        trend.score = update.final_tps;
        trend.trajectory = update.trajectory;
        trend.last_updated = update.scored_at;
        trend.needs_scoring = false;
        Ok(())
    }

    fn decay_candidates(&self, floor: f32) -> Vec<Trend> {
        let inner = self.lock();
        inner
            .trends
            .values()
            .filter(|t| t.is_active && t.final_tps > floor)
            .cloned()
            .collect()
    }

    fn apply_decay(
        &self,
        trend_id: TrendId,
        new_score: f32,
        deactivate: bool,
        seen_updated: DateTime<Utc>,
    ) -> Result<bool> {
        let mut inner = self.lock();
        let Some(trend) = inner.trends.get_mut(&trend_id) else {
            bail!("apply_decay: unknown trend {trend_id}");
        };
        if !trend.is_active {
            // Deactivation is terminal; a racing sweep must not resurrect.
            return Ok(false);
        }
        if trend.last_updated != seen_updated {
            // A scoring commit landed after the sweep's snapshot; the fresh
            // score wins.
            return Ok(false);
        }
        trend.final_tps = new_score;
        trend.score = new_score;
        if deactivate {
            trend.is_active = false;
        }
        Ok(true)
    }

    fn set_category(&self, trend_id: TrendId, category: Category) -> Result<()> {
        let mut inner = self.lock();
        let Some(trend) = inner.trends.get_mut(&trend_id) else {
            bail!("set_category: unknown trend {trend_id}");
        };
        trend.category = category;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(external_id: &str, source: &str) -> NewRawNews {
        NewRawNews {
            source_name: source.to_string(),
            source_tier: 3,
            external_id: external_id.to_string(),
            content: "içerik".to_string(),
            published_at: Utc::now(),
        }
    }

    #[test]
    fn attach_creates_then_joins_and_counts_match_news_rows() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let a = store
            .attach("c1", "başlık", Category::General, item("e1", "AA"), now)
            .unwrap();
        let AttachOutcome::Created(id) = a else {
            panic!("expected Created, got {a:?}");
        };

        let b = store
            .attach("c1", "başlık", Category::General, item("e2", "T24"), now)
            .unwrap();
        assert_eq!(b, AttachOutcome::Joined(id));

        let trend = store.trend(id).unwrap();
        assert_eq!(trend.message_count, 2);
        assert_eq!(store.news_for(id).len() as u64, trend.message_count);
        assert_eq!(store.arrivals(id).len(), 2);
        assert!(trend.needs_scoring);
    }

    #[test]
    fn external_id_dedup_writes_nothing() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .attach("c1", "t", Category::General, item("e1", "AA"), now)
            .unwrap();
        let dup = store
            .attach("c1", "t", Category::General, item("e1", "AA"), now)
            .unwrap();
        assert_eq!(dup, AttachOutcome::Duplicate);

        let trend = store.trend_by_cluster("c1").unwrap();
        assert_eq!(trend.message_count, 1);
        assert_eq!(store.news_for(trend.id).len(), 1);
    }

    #[test]
    fn commit_scores_snapshots_previous_and_clears_flag() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .attach("c1", "t", Category::General, item("e1", "AA"), now)
            .unwrap();
        let id = store.trend_by_cluster("c1").unwrap().id;

        store
            .commit_scores(
                id,
                ScoreUpdate {
                    signal: 30.0,
                    confidence: 1.0,
                    final_tps: 30.0,
                    trajectory: Trajectory::Up,
                    scored_at: now,
                },
            )
            .unwrap();
        let t = store.trend(id).unwrap();
        assert_eq!(t.previous_tps, 0.0);
        assert_eq!(t.final_tps, 30.0);
        assert_eq!(t.score, 30.0);
        assert!(!t.needs_scoring);

        store
            .commit_scores(
                id,
                ScoreUpdate {
                    signal: 40.0,
                    confidence: 1.0,
                    final_tps: 40.0,
                    trajectory: Trajectory::Up,
                    scored_at: now + Duration::minutes(5),
                },
            )
            .unwrap();
        let t = store.trend(id).unwrap();
        assert_eq!(t.previous_tps, 30.0);
        assert_eq!(t.final_tps, 40.0);
    }

    #[test]
    fn deactivated_trends_leave_pending_and_decay_sets() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .attach("c1", "t", Category::General, item("e1", "AA"), now)
            .unwrap();
        let id = store.trend_by_cluster("c1").unwrap().id;
        store
            .commit_scores(
                id,
                ScoreUpdate {
                    signal: 10.0,
                    confidence: 1.0,
                    final_tps: 10.0,
                    trajectory: Trajectory::Steady,
                    scored_at: now,
                },
            )
            .unwrap();
        assert_eq!(store.decay_candidates(3.0).len(), 1);

        let seen = store.trend(id).unwrap().last_updated;
        assert!(store.apply_decay(id, 1.5, true, seen).unwrap());
        let t = store.trend(id).unwrap();
        assert!(!t.is_active);
        assert!(store.decay_candidates(0.0).is_empty());
        assert!(store.pending(50).is_empty());
    }

    #[test]
    fn decay_write_from_a_stale_snapshot_is_skipped() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .attach("c1", "t", Category::General, item("e1", "AA"), now)
            .unwrap();
        let id = store.trend_by_cluster("c1").unwrap().id;
        store
            .commit_scores(
                id,
                ScoreUpdate {
                    signal: 50.0,
                    confidence: 1.0,
                    final_tps: 50.0,
                    trajectory: Trajectory::Steady,
                    scored_at: now - Duration::hours(2),
                },
            )
            .unwrap();
        let snapshot = store.trend(id).unwrap();

        // A scoring commit lands between the sweep's read and its write.
        store
            .commit_scores(
                id,
                ScoreUpdate {
                    signal: 80.0,
                    confidence: 1.0,
                    final_tps: 80.0,
                    trajectory: Trajectory::Up,
                    scored_at: now,
                },
            )
            .unwrap();

        // The stale-derived decay value must not replace the fresh score.
        let applied = store
            .apply_decay(id, 42.3, false, snapshot.last_updated)
            .unwrap();
        assert!(!applied);
        let t = store.trend(id).unwrap();
        assert_eq!(t.final_tps, 80.0);
        assert_eq!(t.score, 80.0);

        // With a current snapshot the write goes through.
        assert!(store.apply_decay(id, 70.0, false, t.last_updated).unwrap());
        assert_eq!(store.trend(id).unwrap().final_tps, 70.0);
    }

    #[test]
    fn recent_arrivals_are_newest_first() {
        let store = MemoryStore::new();
        let base = Utc::now();
        for i in 0..4 {
            store
                .attach(
                    "c1",
                    "t",
                    Category::General,
                    item(&format!("e{i}"), "AA"),
                    base + Duration::minutes(i),
                )
                .unwrap();
        }
        let id = store.trend_by_cluster("c1").unwrap().id;
        let recent = store.recent_arrivals(id, 2);
        assert_eq!(recent.len(), 2);
        assert!(recent[0].timestamp > recent[1].timestamp);
    }
}
