// src/lib.rs
// Public library surface: collectors link against `ClusterEngine`, the binary
// wires the scheduler; integration tests exercise both through this crate root.

pub mod ai;
pub mod alert;
pub mod cluster;
pub mod config;
pub mod decay;
pub mod model;
pub mod scheduler;
pub mod scoring;
pub mod sources;
pub mod store;
pub mod text;

// ---- Re-exports for stable public API ----
pub use crate::alert::{AlertSink, NullAlerter, TelegramAlerter, TrendAlert};
pub use crate::cluster::{Assignment, ClusterEngine};
pub use crate::config::EngineConfig;
pub use crate::decay::GravitySweep;
pub use crate::model::{Category, Trajectory, Trend};
pub use crate::scheduler::Scheduler;
pub use crate::scoring::TpsEngine;
pub use crate::store::{MemoryStore, Store};
