//! Gravity: time-based exponential score decay.
//!
//! `new = old · factor^hours_idle`, with the hourly factor looked up per
//! category (politics cools slowly, sports fast). A pure read-modify-write
//! sweep over the store: no external calls, no re-scoring, only shrinking.
//! Trends that fall below the deactivation floor are retired for good.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::DecayConfig;
use crate::store::Store;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecayStats {
    pub examined: usize,
    pub decayed: usize,
    pub deactivated: usize,
}

#[derive(Clone)]
pub struct GravitySweep {
    store: Arc<dyn Store>,
    cfg: DecayConfig,
}

impl GravitySweep {
    pub fn new(store: Arc<dyn Store>, cfg: DecayConfig) -> Self {
        Self { store, cfg }
    }

    /// Age every active trend above the score floor. Trends updated within
    /// the grace period (1h by default) are left untouched so fresh signal is
    /// never eroded before it has been rescored.
    pub fn decay_all(&self, now: DateTime<Utc>) -> DecayStats {
        let candidates = self.store.decay_candidates(self.cfg.score_floor);
        let mut stats = DecayStats {
            examined: candidates.len(),
            ..DecayStats::default()
        };

        for trend in candidates {
            let hours_idle = (now - trend.last_updated).num_seconds() as f64 / 3600.0;
            if hours_idle < self.cfg.min_idle_hours as f64 {
                continue;
            }

            let factor = self.cfg.factor_for(trend.category) as f64;
            let new_score = (trend.final_tps as f64 * factor.powf(hours_idle)) as f32;
            let deactivate = new_score < self.cfg.deactivation_floor;

            // The snapshot's `last_updated` guards the write: a trend rescored
            // during the sweep is left alone.
            match self
                .store
                .apply_decay(trend.id, new_score, deactivate, trend.last_updated)
            {
                Ok(true) => {}
                Ok(false) => {
                    debug!(trend = trend.id, "trend rescored during sweep; skipped");
                    continue;
                }
                Err(e) => {
                    warn!(trend = trend.id, error = %e, "decay write failed");
                    continue;
                }
            }

            stats.decayed += 1;
            if deactivate {
                stats.deactivated += 1;
            }
            debug!(
                trend = trend.id,
                category = trend.category.as_str(),
                from = format!("{:.1}", trend.final_tps),
                to = format!("{new_score:.1}"),
                "gravity applied"
            );
        }

        if stats.examined > 0 {
            info!(
                examined = stats.examined,
                decayed = stats.decayed,
                deactivated = stats.deactivated,
                "gravity sweep complete"
            );
        }
        stats
    }
}
