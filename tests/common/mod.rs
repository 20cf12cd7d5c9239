//! Shared test doubles: deterministic embedder, scripted LLM, capturing
//! alert sink, and a fully wired engine rig over the in-memory index/store.
#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use trendpulse::ai::memory::MemoryIndex;
use trendpulse::ai::{ContentAnalysis, Embedder, LlmClient, ServiceError};
use trendpulse::alert::{AlertSink, TrendAlert};
use trendpulse::cluster::ClusterEngine;
use trendpulse::config::{ClusterConfig, ScoringConfig};
use trendpulse::scoring::TpsEngine;
use trendpulse::sources::SourceTiers;
use trendpulse::store::MemoryStore;

fn bad_response(detail: &str) -> ServiceError {
    ServiceError::BadResponse {
        service: "fake",
        detail: detail.to_string(),
    }
}

/// Deterministic embedder. Texts can be pinned to explicit vectors; anything
/// unpinned gets a stable hash-derived unit vector, so unrelated texts are
/// (almost surely) far apart.
#[derive(Default)]
pub struct FakeEmbedder {
    pinned: Mutex<Vec<(String, Vec<f32>)>>,
    fail_marker: Mutex<Option<String>>,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin every text containing `key` to `vector`.
    pub fn pin(&self, key: &str, vector: Vec<f32>) {
        self.pinned
            .lock()
            .unwrap()
            .push((key.to_string(), vector));
    }

    /// Make `embed` fail for texts containing `marker`.
    pub fn fail_on(&self, marker: &str) {
        *self.fail_marker.lock().unwrap() = Some(marker.to_string());
    }

    fn hash_vector(text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut seed = hasher.finish();
        let mut v = Vec::with_capacity(8);
        for _ in 0..8 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            v.push(((seed >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0);
        }
        v
    }
}

#[async_trait::async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        if let Some(marker) = self.fail_marker.lock().unwrap().as_deref() {
            if text.contains(marker) {
                return Err(bad_response("embedder down"));
            }
        }
        for (key, vector) in self.pinned.lock().unwrap().iter() {
            if text.contains(key.as_str()) {
                return Ok(vector.clone());
            }
        }
        Ok(Self::hash_vector(text))
    }
}

/// Scripted LLM: a fixed match verdict (or forced failure) plus a settable
/// analysis result, with call counting for the fast-path assertions.
pub struct FakeLlm {
    match_verdict: AtomicBool,
    match_fails: AtomicBool,
    match_calls: AtomicUsize,
    analysis: Mutex<Option<ContentAnalysis>>,
}

impl Default for FakeLlm {
    fn default() -> Self {
        Self {
            match_verdict: AtomicBool::new(false),
            match_fails: AtomicBool::new(false),
            match_calls: AtomicUsize::new(0),
            analysis: Mutex::new(Some(ContentAnalysis {
                entity_score: 50.0,
                criticality_score: 50.0,
                is_opinion: false,
            })),
        }
    }
}

impl FakeLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_match_verdict(&self, verdict: bool) {
        self.match_verdict.store(verdict, Ordering::SeqCst);
    }

    pub fn fail_matches(&self, fail: bool) {
        self.match_fails.store(fail, Ordering::SeqCst);
    }

    pub fn match_calls(&self) -> usize {
        self.match_calls.load(Ordering::SeqCst)
    }

    pub fn set_analysis(&self, entity: f32, criticality: f32, is_opinion: bool) {
        *self.analysis.lock().unwrap() = Some(ContentAnalysis {
            entity_score: entity,
            criticality_score: criticality,
            is_opinion,
        });
    }

    /// Make `analyze` fail, exercising the neutral-default fallback.
    pub fn fail_analysis(&self) {
        *self.analysis.lock().unwrap() = None;
    }
}

#[async_trait::async_trait]
impl LlmClient for FakeLlm {
    async fn same_event(&self, _reference: &str, _candidate: &str) -> Result<bool, ServiceError> {
        self.match_calls.fetch_add(1, Ordering::SeqCst);
        if self.match_fails.load(Ordering::SeqCst) {
            return Err(bad_response("llm down"));
        }
        Ok(self.match_verdict.load(Ordering::SeqCst))
    }

    async fn analyze(&self, _text: &str) -> Result<ContentAnalysis, ServiceError> {
        self.analysis
            .lock()
            .unwrap()
            .ok_or_else(|| bad_response("llm down"))
    }
}

#[derive(Default)]
pub struct CapturingAlerts {
    sent: Mutex<Vec<TrendAlert>>,
}

impl CapturingAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<TrendAlert> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl AlertSink for CapturingAlerts {
    async fn notify(&self, alert: &TrendAlert) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// Everything wired together over the in-memory backends.
pub struct Rig {
    pub store: Arc<MemoryStore>,
    pub index: Arc<MemoryIndex>,
    pub embedder: Arc<FakeEmbedder>,
    pub llm: Arc<FakeLlm>,
    pub alerts: Arc<CapturingAlerts>,
    pub cluster: Arc<ClusterEngine>,
    pub scoring: Arc<TpsEngine>,
}

pub fn rig() -> Rig {
    rig_with(ClusterConfig::default(), ScoringConfig::default())
}

pub fn rig_with(cluster_cfg: ClusterConfig, scoring_cfg: ScoringConfig) -> Rig {
    let store = Arc::new(MemoryStore::new());
    let index = Arc::new(MemoryIndex::new());
    let embedder = Arc::new(FakeEmbedder::new());
    let llm = Arc::new(FakeLlm::new());
    let alerts = Arc::new(CapturingAlerts::new());

    let cluster = Arc::new(ClusterEngine::new(
        embedder.clone(),
        index.clone(),
        llm.clone(),
        store.clone(),
        SourceTiers::default(),
        cluster_cfg,
    ));
    let scoring = Arc::new(TpsEngine::new(
        embedder.clone(),
        index.clone(),
        llm.clone(),
        store.clone(),
        alerts.clone(),
        cluster.clone(),
        scoring_cfg,
    ));

    Rig {
        store,
        index,
        embedder,
        llm,
        alerts,
        cluster,
        scoring,
    }
}

/// A long-enough, spam-free Turkish-looking sentence with a distinguishing tag.
pub fn sample_text(tag: &str) -> String {
    format!("{tag} hakkında yeni gelişme yaşandı, yetkililer açıklama yaptı")
}
