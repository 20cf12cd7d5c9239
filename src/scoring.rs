//! Scoring engine (TPS 2.1).
//!
//! Fuses propagation velocity, burst acceleration, entity impact, semantic
//! criticality and novelty into one bounded [0, 100] score per trend:
//!
//! `signal = (0.35·V + 0.25·E + 0.25·S + 0.15·N) · boost`
//! `final  = min(100, signal · confidence)`
//!
//! The pure pieces (velocity, acceleration, boost, confidence, trajectory)
//! are free functions so they can be unit-tested without any service; the
//! `TpsEngine` orchestrates them plus the LLM/vector calls and commits the
//! result atomically. Failures in optional enrichment (LLM analysis, alerts)
//! degrade to defaults and never abort a cycle; only a store commit failure
//! leaves `needs_scoring` set for retry.

use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::ai::{ContentAnalysis, DynEmbedder, DynLlmClient, DynVectorIndex, QueryFilter};
use crate::alert::{AlertSink, TrendAlert};
use crate::cluster::ClusterEngine;
use crate::config::ScoringConfig;
use crate::model::{RawNews, Trajectory, TrendArrival, TrendId};
use crate::store::{ScoreUpdate, Store};
use crate::text::{contains_junk, normalize_lower};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("tps_cycles_total", "Completed scoring cycles.");
        describe_counter!(
            "tps_cycle_errors_total",
            "Scoring cycles that failed and were left for retry."
        );
        describe_counter!(
            "trend_alerts_total",
            "Admin alerts fired on threshold crossings."
        );
    });
}

/// Propagation velocity: `35 · log2(1 + arrivals per minute)`, clamped to
/// [0, 100]. A single-arrival trend has no rate yet and gets the base score.
pub fn velocity(arrivals: &[TrendArrival], cfg: &ScoringConfig) -> f32 {
    if arrivals.is_empty() {
        return 0.0;
    }
    let count = arrivals.len();
    if count <= 1 {
        return cfg.base_velocity;
    }

    let first = arrivals[0].timestamp;
    let last = arrivals[count - 1].timestamp;
    let duration_mins = ((last - first).num_seconds() as f64 / 60.0).max(1.0);

    let v = 35.0 * (1.0 + count as f64 / duration_mins).log2();
    (v as f32).clamp(0.0, 100.0)
}

/// Burst detection over the most recent arrivals (newest first). When the
/// span of the last 3 arrivals is under `accel_ratio` of the mean gap, the
/// trend is spreading explosively.
pub fn acceleration(recent: &[TrendArrival], cfg: &ScoringConfig) -> Trajectory {
    if recent.len() < cfg.accel_min_arrivals {
        return Trajectory::Steady;
    }

    let recent_gap = (recent[0].timestamp - recent[2].timestamp).num_seconds() as f64;
    let total_span = (recent[0].timestamp - recent[recent.len() - 1].timestamp).num_seconds() as f64;
    let avg_gap = total_span / recent.len() as f64;

    if recent_gap < avg_gap * cfg.accel_ratio as f64 {
        Trajectory::Up
    } else {
        Trajectory::Steady
    }
}

/// Strategic boost from critical vocabulary in the reference text.
pub fn criticality_boost(text: &str, cfg: &ScoringConfig) -> f32 {
    if text.is_empty() {
        return 1.0;
    }
    let norm = normalize_lower(text);
    if cfg.high_keywords.iter().any(|kw| norm.contains(kw.as_str())) {
        cfg.boost_high
    } else if cfg
        .medium_keywords
        .iter()
        .any(|kw| norm.contains(kw.as_str()))
    {
        cfg.boost_medium
    } else {
        1.0
    }
}

/// Source-trust confidence: best tier weight times a diversity bonus for the
/// number of distinct source names, capped.
pub fn confidence(news: &[RawNews], cfg: &ScoringConfig) -> f32 {
    if news.is_empty() {
        return 0.5;
    }

    let best_tier = news.iter().map(|n| n.source_tier).min().unwrap_or(3);
    let base = cfg.tier_weight(best_tier);

    let distinct: std::collections::HashSet<&str> =
        news.iter().map(|n| n.source_name.as_str()).collect();
    let diversity = match distinct.len() {
        n if n >= 5 => 1.35,
        n if n >= 3 => 1.25,
        n if n >= 2 => 1.15,
        _ => 1.0,
    };

    (base * diversity).min(cfg.confidence_cap)
}

/// Score-delta trajectory; a trend with no prior score trends up by default.
pub fn trajectory(current: f32, prior: f32, cfg: &ScoringConfig) -> Trajectory {
    if prior <= 0.0 {
        return Trajectory::Up;
    }
    let change = (current - prior) / prior;
    if change > cfg.trajectory_band {
        Trajectory::Up
    } else if change < -cfg.trajectory_band {
        Trajectory::Down
    } else {
        Trajectory::Steady
    }
}

pub struct TpsEngine {
    embedder: DynEmbedder,
    index: DynVectorIndex,
    llm: DynLlmClient,
    store: Arc<dyn Store>,
    alerts: Arc<dyn AlertSink>,
    cluster: Arc<ClusterEngine>,
    cfg: ScoringConfig,
}

impl TpsEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        embedder: DynEmbedder,
        index: DynVectorIndex,
        llm: DynLlmClient,
        store: Arc<dyn Store>,
        alerts: Arc<dyn AlertSink>,
        cluster: Arc<ClusterEngine>,
        cfg: ScoringConfig,
    ) -> Self {
        ensure_metrics_described();
        Self {
            embedder,
            index,
            llm,
            store,
            alerts,
            cluster,
            cfg,
        }
    }

    /// Novelty: inverse similarity of the reference text to the closest known
    /// content, with no recency filter. Service failures degrade to a neutral
    /// midpoint rather than aborting the cycle.
    async fn novelty(&self, text: &str) -> f32 {
        let vector = match self.embedder.embed(text).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "novelty embedding failed; using neutral value");
                return 50.0;
            }
        };
        let hits = match self.index.query(&vector, 1, QueryFilter::default()).await {
            Ok(h) => h,
            Err(e) => {
                warn!(error = %e, "novelty lookup failed; using neutral value");
                return 50.0;
            }
        };

        let Some(nearest) = hits.first() else {
            return 100.0;
        };
        let similarity = 1.0 - nearest.distance;
        if similarity > self.cfg.novelty_ceiling {
            0.0
        } else {
            100.0 * (1.0 - similarity)
        }
    }

    /// Entity/criticality/opinion analysis with the documented neutral
    /// fallback on any LLM failure.
    async fn analyze(&self, text: &str) -> ContentAnalysis {
        match self.llm.analyze(text).await {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "semantic analysis failed; using neutral defaults");
                ContentAnalysis {
                    entity_score: self.cfg.neutral_analysis,
                    criticality_score: self.cfg.neutral_analysis,
                    is_opinion: false,
                }
            }
        }
    }

    /// One full scoring cycle for a pending trend. Returns the final score, or
    /// `None` when the trend is missing, inactive, or has no scoreable text
    /// (the flag is then left as-is for a later retry).
    pub async fn run_cycle(&self, trend_id: TrendId) -> anyhow::Result<Option<f32>> {
        let Some(trend) = self.store.trend(trend_id) else {
            return Ok(None);
        };
        if !trend.is_active {
            return Ok(None);
        }

        let reference = match self.cluster.reference_doc(&trend.cluster_id).await {
            Ok(Some(doc)) => doc,
            Ok(None) | Err(_) => {
                // Vector store has nothing for this cluster; fall back to the
                // oldest raw item.
                match self.store.news_for(trend_id).into_iter().next() {
                    Some(news) => news.content,
                    None => return Ok(None),
                }
            }
        };

        let arrivals = self.store.arrivals(trend_id);
        let v = velocity(&arrivals, &self.cfg);
        let accel = acceleration(
            &self.store.recent_arrivals(trend_id, self.cfg.accel_window),
            &self.cfg,
        );
        let analysis = self.analyze(&reference).await;
        let n = self.novelty(&reference).await;
        let boost = criticality_boost(&reference, &self.cfg);

        let signal = (self.cfg.w_velocity * v
            + self.cfg.w_entity * analysis.entity_score
            + self.cfg.w_criticality * analysis.criticality_score
            + self.cfg.w_novelty * n)
            * boost;

        let news = self.store.news_for(trend_id);
        let conf = confidence(&news, &self.cfg);

        let mut final_tps = (signal * conf).min(100.0);

        // Punitive overrides come after fusion: junk content is pinned to a
        // low ceiling, opinion pieces are discounted.
        let headline = trend
            .title
            .clone()
            .unwrap_or_else(|| reference.chars().take(100).collect());
        if contains_junk(&normalize_lower(&headline)) {
            final_tps = final_tps.min(self.cfg.junk_ceiling);
        }
        if analysis.is_opinion {
            final_tps *= self.cfg.opinion_penalty;
        }
        final_tps = final_tps.clamp(0.0, 100.0);

        // The last published score, before this cycle overwrites it; drives
        // both the trajectory delta and the alert edge-trigger.
        let prior = trend.final_tps;

        let traj = if accel == Trajectory::Up {
            Trajectory::Up
        } else {
            trajectory(final_tps, prior, &self.cfg)
        };

        // Edge-triggered: fire only on the upward crossing, not on every
        // cycle that stays above the threshold.
        if final_tps >= self.cfg.alert_threshold && prior < self.cfg.alert_threshold {
            let alert = TrendAlert {
                title: headline,
                tps: final_tps,
                trajectory: traj,
                cluster_id: trend.cluster_id.clone(),
            };
            if let Err(e) = self.alerts.notify(&alert).await {
                warn!(trend = trend_id, error = %e, "admin alert failed; continuing");
            } else {
                counter!("trend_alerts_total").increment(1);
            }
        }

        self.store.commit_scores(
            trend_id,
            ScoreUpdate {
                signal,
                confidence: conf,
                final_tps,
                trajectory: traj,
                scored_at: Utc::now(),
            },
        )?;

        counter!("tps_cycles_total").increment(1);
        info!(
            trend = trend_id,
            tps = format!("{final_tps:.2}"),
            trajectory = traj.as_str(),
            "scoring cycle complete"
        );
        Ok(Some(final_tps))
    }
}
