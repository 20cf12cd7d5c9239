//! Async work scheduler.
//!
//! One cooperative loop drives both cadences: it drains the pending-rescoring
//! queue in capped batches (tight 1s polling under load, 5s when idle) and
//! runs the gravity sweep once at startup, then every 30 minutes. Trends are
//! scored sequentially; one failed cycle is logged and skipped so it can
//! never block the rest of the batch. The sweep's synchronous store scan runs
//! on a blocking worker so it never ties up the async runtime.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::SchedulerConfig;
use crate::decay::{DecayStats, GravitySweep};
use crate::scoring::TpsEngine;
use crate::store::Store;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("gravity_sweeps_total", "Completed gravity decay sweeps.");
        describe_counter!(
            "trends_deactivated_total",
            "Trends retired after decaying below the floor."
        );
        describe_gauge!("pending_trends", "Trends awaiting a scoring cycle.");
    });
}

pub struct Scheduler {
    scoring: Arc<TpsEngine>,
    gravity: GravitySweep,
    store: Arc<dyn Store>,
    cfg: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        scoring: Arc<TpsEngine>,
        gravity: GravitySweep,
        store: Arc<dyn Store>,
        cfg: SchedulerConfig,
    ) -> Self {
        ensure_metrics_described();
        Self {
            scoring,
            gravity,
            store,
            cfg,
        }
    }

    /// Score one batch of pending trends. Returns how many were attempted.
    pub async fn drain_pending_once(&self) -> usize {
        let pending = self.store.pending(self.cfg.batch_size);
        gauge!("pending_trends").set(pending.len() as f64);

        let mut processed = 0usize;
        for trend_id in pending {
            processed += 1;
            match self.scoring.run_cycle(trend_id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    debug!(trend = trend_id, "cycle skipped (inactive or no text)");
                }
                Err(e) => {
                    // Flag stays set; the trend is retried on a later tick.
                    counter!("tps_cycle_errors_total").increment(1);
                    warn!(trend = trend_id, error = %e, "scoring cycle failed");
                }
            }
        }
        processed
    }

    /// Run one gravity sweep on a blocking worker and record its metrics.
    pub async fn run_gravity_once(&self) -> DecayStats {
        let gravity = self.gravity.clone();
        match tokio::task::spawn_blocking(move || gravity.decay_all(Utc::now())).await {
            Ok(stats) => {
                counter!("gravity_sweeps_total").increment(1);
                counter!("trends_deactivated_total").increment(stats.deactivated as u64);
                stats
            }
            Err(e) => {
                warn!(error = %e, "gravity sweep task failed");
                DecayStats::default()
            }
        }
    }

    pub async fn run(self) {
        let busy = Duration::from_secs(self.cfg.busy_sleep_secs);
        let idle = Duration::from_secs(self.cfg.idle_sleep_secs);
        let gravity_every = Duration::from_secs(self.cfg.gravity_interval_secs);

        // Sweep once at startup; a restart must not leave stale scores
        // standing for a full interval.
        self.run_gravity_once().await;
        let mut last_sweep = Instant::now();

        loop {
            if last_sweep.elapsed() >= gravity_every {
                self.run_gravity_once().await;
                last_sweep = Instant::now();
            }

            let processed = self.drain_pending_once().await;
            let nap = if processed > 0 { busy } else { idle };
            tokio::time::sleep(nap).await;
        }
    }

    /// Detach the scheduler onto the runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
