//! Central configuration.
//!
//! Every hand-tuned constant in the pipeline (cosine thresholds, TPS weights,
//! decay factors) is a config field with a serde default, so they can be
//! re-tuned from a JSON file without touching code. `EngineConfig::load`
//! reads the optional file, then applies environment overrides.

use std::collections::HashMap;
use std::{env, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::model::Category;
use crate::sources::SourceTiers;

pub const DEFAULT_CONFIG_PATH: &str = "config/engine.json";
pub const ENV_CONFIG_PATH: &str = "TRENDPULSE_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub api_url: String,
    pub model: String,
    pub embed_url: String,
    pub embed_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:11434/api/generate".into(),
            model: "qwen2.5:1.5b".into(),
            embed_url: "http://localhost:11434/api/embeddings".into(),
            embed_model: "paraphrase-multilingual".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaConfig {
    /// Base URL of the Chroma server; `None` falls back to the in-memory index.
    pub url: Option<String>,
    pub collection: String,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            url: None,
            collection: "news_clusters".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Hard admission gate on cleaned-text length.
    pub min_text_len: usize,
    /// Nearest neighbors fetched per admission query.
    pub neighbors: usize,
    /// Cosine distance above which a neighbor is never considered.
    pub accept_ceiling: f32,
    /// Cosine distance below which a match is accepted without LLM review.
    pub duplicate_ceiling: f32,
    /// Rolling admission window; older documents cannot be joined.
    pub window_hours: i64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            min_text_len: 20,
            neighbors: 5,
            accept_ceiling: 0.40,
            duplicate_ceiling: 0.08,
            window_hours: 48,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub w_velocity: f32,
    pub w_entity: f32,
    pub w_criticality: f32,
    pub w_novelty: f32,
    /// Velocity assigned to a single-arrival trend.
    pub base_velocity: f32,
    /// Arrivals inspected for burst detection.
    pub accel_window: usize,
    /// Minimum arrivals before acceleration is evaluated.
    pub accel_min_arrivals: usize,
    /// Recent gap under this fraction of the mean gap flags a burst.
    pub accel_ratio: f32,
    /// Fallback entity/criticality score when the LLM call fails.
    pub neutral_analysis: f32,
    /// Similarity above this is treated as a repost (novelty 0).
    pub novelty_ceiling: f32,
    /// Hard score ceiling for junk-keyword content.
    pub junk_ceiling: f32,
    /// Multiplier applied to opinion/commentary content.
    pub opinion_penalty: f32,
    pub boost_high: f32,
    pub boost_medium: f32,
    pub high_keywords: Vec<String>,
    pub medium_keywords: Vec<String>,
    /// Trust-tier weights, indexed by tier (1-based).
    pub tier_weights: HashMap<u8, f32>,
    pub confidence_cap: f32,
    /// Relative change beyond which the trajectory flips up/down.
    pub trajectory_band: f32,
    pub alert_threshold: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let list = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            w_velocity: 0.35,
            w_entity: 0.25,
            w_criticality: 0.25,
            w_novelty: 0.15,
            base_velocity: 15.0,
            accel_window: 15,
            accel_min_arrivals: 5,
            accel_ratio: 0.4,
            neutral_analysis: 30.0,
            novelty_ceiling: 0.88,
            junk_ceiling: 12.0,
            opinion_penalty: 0.55,
            boost_high: 1.6,
            boost_medium: 1.25,
            high_keywords: list(&[
                "deprem",
                "patlama",
                "istifa",
                "suikast",
                "darbe",
                "saldırı",
                "acil durum",
                "infaz",
                "terör",
                "faci",
                "şehit",
            ]),
            medium_keywords: list(&[
                "faiz kararı",
                "seçim",
                "gözaltı",
                "operasyon",
                "flaş haber",
                "son dakika",
                "kararname",
            ]),
            tier_weights: HashMap::from([(1, 1.25), (2, 1.00), (3, 0.75)]),
            confidence_cap: 1.5,
            trajectory_band: 0.06,
            alert_threshold: 20.0,
        }
    }
}

impl ScoringConfig {
    pub fn tier_weight(&self, tier: u8) -> f32 {
        self.tier_weights.get(&tier).copied().unwrap_or(0.75)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    /// Hourly decay factor per category; lower cools faster.
    pub factors: HashMap<Category, f32>,
    pub default_factor: f32,
    /// Trends at or below this score are not decayed further.
    pub score_floor: f32,
    /// Decayed trends below this score are deactivated.
    pub deactivation_floor: f32,
    /// Trends updated more recently than this many hours are left alone.
    pub min_idle_hours: f32,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            factors: HashMap::from([
                (Category::Politics, 0.98),
                (Category::Economy, 0.97),
                (Category::Technology, 0.94),
                (Category::General, 0.92),
                (Category::Entertainment, 0.88),
                (Category::Sports, 0.85),
            ]),
            default_factor: 0.93,
            score_floor: 3.0,
            deactivation_floor: 2.0,
            min_idle_hours: 1.0,
        }
    }
}

impl DecayConfig {
    pub fn factor_for(&self, category: Category) -> f32 {
        self.factors
            .get(&category)
            .copied()
            .unwrap_or(self.default_factor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Max trends scored per tick.
    pub batch_size: usize,
    pub busy_sleep_secs: u64,
    pub idle_sleep_secs: u64,
    pub gravity_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            busy_sleep_secs: 1,
            idle_sleep_secs: 5,
            gravity_interval_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Telegram bot token; missing token disables admin alerts entirely.
    pub bot_token: Option<String>,
    pub admin_chat_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ollama: OllamaConfig,
    pub chroma: ChromaConfig,
    pub cluster: ClusterConfig,
    pub scoring: ScoringConfig,
    pub decay: DecayConfig,
    pub scheduler: SchedulerConfig,
    pub alert: AlertConfig,
    pub tiers: SourceTiers,
}

impl EngineConfig {
    /// Load from the config file (if present), then apply env overrides and
    /// sanity clamps.
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut cfg = Self::load_from_file(&path)?;
        cfg.apply_env_overrides();
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if !path.as_ref().exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)?;
        let cfg: EngineConfig = serde_json::from_str(&data)?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("OLLAMA_API_URL") {
            self.ollama.api_url = url;
        }
        if let Ok(url) = env::var("OLLAMA_EMBED_URL") {
            self.ollama.embed_url = url;
        }
        if let Ok(url) = env::var("CHROMA_URL") {
            self.chroma.url = Some(url);
        }
        if let Ok(token) = env::var("TELEGRAM_BOT_TOKEN") {
            self.alert.bot_token = Some(token);
        }
        if let Ok(chat) = env::var("ADMIN_CHAT_ID") {
            self.alert.admin_chat_id = Some(chat);
        }
        if let Ok(raw) = env::var("TPS_ALERT_THRESHOLD") {
            if let Ok(v) = raw.parse::<f32>() {
                self.scoring.alert_threshold = v;
            }
        }
    }

    fn sanitize(&mut self) {
        let defaults = ClusterConfig::default();
        if !(0.0..=2.0).contains(&self.cluster.accept_ceiling) {
            self.cluster.accept_ceiling = defaults.accept_ceiling;
        }
        if !(0.0..=2.0).contains(&self.cluster.duplicate_ceiling) {
            self.cluster.duplicate_ceiling = defaults.duplicate_ceiling;
        }
        if self.cluster.duplicate_ceiling > self.cluster.accept_ceiling {
            std::mem::swap(
                &mut self.cluster.duplicate_ceiling,
                &mut self.cluster.accept_ceiling,
            );
        }
        if self.scheduler.batch_size == 0 {
            self.scheduler.batch_size = SchedulerConfig::default().batch_size;
        }
        for factor in self.decay.factors.values_mut() {
            *factor = factor.clamp(0.0, 1.0);
        }
        self.decay.default_factor = self.decay.default_factor.clamp(0.0, 1.0);
    }
}
