//! Trend engine — binary entrypoint.
//! Wires the external services (Ollama, Chroma, Telegram) to the scoring
//! scheduler and runs until interrupted. Collectors are separate processes
//! that feed `ClusterEngine::submit_candidate` through the library surface.

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trendpulse::ai::chroma::ChromaIndex;
use trendpulse::ai::memory::MemoryIndex;
use trendpulse::ai::ollama::{OllamaClient, OllamaEmbedder};
use trendpulse::ai::DynVectorIndex;
use trendpulse::alert::{AlertSink, NullAlerter, TelegramAlerter};
use trendpulse::cluster::ClusterEngine;
use trendpulse::config::EngineConfig;
use trendpulse::decay::GravitySweep;
use trendpulse::scheduler::Scheduler;
use trendpulse::scoring::TpsEngine;
use trendpulse::store::MemoryStore;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trendpulse=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    // Optional Prometheus endpoint; skipped entirely when unset.
    if let Ok(addr) = std::env::var("PROMETHEUS_ADDR") {
        let addr: std::net::SocketAddr = addr.parse()?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!(%addr, "prometheus exporter listening");
    }

    let cfg = EngineConfig::load()?;

    let embedder = Arc::new(OllamaEmbedder::new(&cfg.ollama));
    let llm = Arc::new(OllamaClient::new(&cfg.ollama));

    let index: DynVectorIndex = match &cfg.chroma.url {
        Some(url) => {
            let chroma = ChromaIndex::connect(url, &cfg.chroma.collection).await?;
            info!(url = %url, collection = %cfg.chroma.collection, "connected to vector store");
            Arc::new(chroma)
        }
        None => {
            warn!("CHROMA_URL not set; using volatile in-memory vector index");
            Arc::new(MemoryIndex::new())
        }
    };

    let alerts: Arc<dyn AlertSink> = match TelegramAlerter::from_config(&cfg.alert) {
        Some(telegram) => Arc::new(telegram),
        None => {
            info!("admin alerts disabled (no telegram credentials)");
            Arc::new(NullAlerter)
        }
    };

    let store = Arc::new(MemoryStore::new());

    let cluster = Arc::new(ClusterEngine::new(
        embedder.clone(),
        index.clone(),
        llm.clone(),
        store.clone(),
        cfg.tiers.clone(),
        cfg.cluster.clone(),
    ));
    let scoring = Arc::new(TpsEngine::new(
        embedder,
        index,
        llm,
        store.clone(),
        alerts,
        cluster,
        cfg.scoring.clone(),
    ));
    let gravity = GravitySweep::new(store.clone(), cfg.decay.clone());

    let handle = Scheduler::new(scoring, gravity, store, cfg.scheduler.clone()).spawn();
    info!("scheduler running; press ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    handle.abort();
    Ok(())
}
