//! Headless sync agent wiring the HTTP scoring backend to the background
//! services: queue drain and connectivity supervision.

use std::{env, sync::Arc};

use anyhow::Context;
use score_sync::{
    backend::{
        PreauthorizedSession,
        http::{HttpBackendConfig, HttpProbe, HttpScoringBackend},
    },
    config::SyncConfig,
    dao::kv::{FileKv, KvHandle},
    services::{connectivity, queue_processor},
    state::SyncState,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let backend_config =
        HttpBackendConfig::from_env().context("reading scoring backend configuration")?;
    let probe = HttpProbe::new(&backend_config.base_url);
    let backend = HttpScoringBackend::new(backend_config).context("building scoring backend")?;

    let kv_path = env::var("SCORE_SYNC_KV_PATH").unwrap_or_else(|_| "score-sync.kv.json".into());
    let kv = KvHandle::new(Arc::new(FileKv::open(kv_path)));

    let state = SyncState::new(
        SyncConfig::load(),
        kv,
        Arc::new(backend),
        PreauthorizedSession::new(),
    );
    info!(pending = state.queue().len(), "sync agent starting");

    tokio::spawn(queue_processor::run(state.clone()));
    tokio::spawn(connectivity::run(state.clone(), Arc::new(probe)));

    shutdown_signal().await;
    info!(pending = state.queue().len(), "sync agent stopping");

    Ok(())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the agent down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
