//! Core data model: raw items, trends and arrival events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TrendId = u64;
pub type RawNewsId = u64;

/// Short-term direction label for a trend's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trajectory {
    Up,
    Down,
    Steady,
}

impl Trajectory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trajectory::Up => "up",
            Trajectory::Down => "down",
            Trajectory::Steady => "steady",
        }
    }
}

/// Coarse content category; only consumed as the decay-factor lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Politics,
    Economy,
    Technology,
    #[default]
    General,
    Entertainment,
    Sports,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Politics => "politics",
            Category::Economy => "economy",
            Category::Technology => "technology",
            Category::General => "general",
            Category::Entertainment => "entertainment",
            Category::Sports => "sports",
            Category::Other => "other",
        }
    }
}

/// One ingested item. Immutable once written except for trend linkage.
#[derive(Debug, Clone)]
pub struct RawNews {
    pub id: RawNewsId,
    pub source_name: String,
    /// 1 = official agency, 2 = reputable outlet, 3 = everything else.
    pub source_tier: u8,
    /// Collector-supplied globally unique id; the dedup key.
    pub external_id: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
    pub trend_id: Option<TrendId>,
}

/// Fields supplied by the clustering engine when persisting a new item.
#[derive(Debug, Clone)]
pub struct NewRawNews {
    pub source_name: String,
    pub source_tier: u8,
    pub external_id: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
}

/// Append-only event: "an item joined trend X at time T". The ordered arrival
/// sequence is the sole input to velocity and acceleration.
#[derive(Debug, Clone)]
pub struct TrendArrival {
    pub trend_id: TrendId,
    pub raw_news_id: Option<RawNewsId>,
    pub timestamp: DateTime<Utc>,
}

/// A cluster of raw items believed to describe one real-world event, carrying
/// the live TPS score fields.
#[derive(Debug, Clone)]
pub struct Trend {
    pub id: TrendId,
    /// Stable identifier, assigned once at creation; also the vector-store
    /// partition key. Never reused.
    pub cluster_id: String,
    pub title: Option<String>,
    pub category: Category,
    pub message_count: u64,
    /// Legacy mirror of `final_tps`, kept in sync on every write.
    pub score: f32,
    /// Pre-confidence fused signal from the last scoring cycle.
    pub tps_signal: f32,
    /// Source-trust multiplier from the last scoring cycle.
    pub tps_confidence: f32,
    /// Published score, always within [0, 100].
    pub final_tps: f32,
    /// Snapshot of `final_tps` from the prior scoring cycle.
    pub previous_tps: f32,
    pub trajectory: Trajectory,
    /// Work-queue flag: set on every membership change, cleared only by a
    /// completed scoring cycle.
    pub needs_scoring: bool,
    pub first_seen: DateTime<Utc>,
    /// Clock used by decay.
    pub last_updated: DateTime<Utc>,
    /// False removes the trend from scoring and decay permanently.
    pub is_active: bool,
}
