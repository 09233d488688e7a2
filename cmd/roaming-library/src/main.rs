//! # Roaming Library
//!
//! Mounts the storage medium, checks the on-card layout, then runs the HTTP
//! server, the DNS responder and the forum cleanup ticker on one
//! single-threaded runtime.

mod dns;

use anyhow::Context;
use api_adapters::AppState;
use configs::{LogFormat, LogSettings, Settings};
use domains::Storage;
use services::{storage::ensure_layout, ForumJanitor, LogIndicator, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use storage_adapters::{LocalStorage, MemoryStorage};
use tracing_subscriber::EnvFilter;

const CLEANUP_TICK: Duration = Duration::from_secs(1);

fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load configuration")?;
    init_tracing(&settings.log);

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?
        .block_on(run(settings))
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// A medium that fails to mount still yields a storage handle; the layout
/// check then fails and the node runs in its storage-unavailable mode.
async fn mount_storage(settings: &Settings) -> Arc<dyn Storage> {
    if settings.storage.in_memory {
        tracing::warn!("using in-memory storage; nothing will survive a restart");
        return Arc::new(MemoryStorage::new());
    }
    match LocalStorage::mount(settings.storage.root.clone()).await {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            tracing::error!(root = %settings.storage.root.display(), error = %e, "storage mount failed");
            Arc::new(LocalStorage::new(settings.storage.root.clone()))
        }
    }
}

async fn run(settings: Settings) -> anyhow::Result<()> {
    let storage = mount_storage(&settings).await;
    let storage_ready = ensure_layout(storage.as_ref(), &settings.storage.collection_root()).await;
    if !storage_ready {
        tracing::error!("storage layout incomplete; documents and forum disabled");
    }

    let state = AppState::new(
        &settings,
        storage,
        Arc::new(SystemClock::new()),
        Arc::new(LogIndicator),
        storage_ready,
    );

    tokio::spawn(cleanup_ticker(Arc::clone(&state.janitor)));

    if settings.dns.enabled {
        let (bind_addr, ip) = (settings.dns.bind_addr, settings.server.device_ip);
        tokio::spawn(async move {
            if let Err(e) = dns::serve(bind_addr, ip).await {
                tracing::error!(%bind_addr, error = %e, "dns responder stopped");
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(settings.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.server.bind_addr))?;
    tracing::info!(
        addr = %settings.server.bind_addr,
        node = %settings.server.node_name,
        portal = %state.portal.device_url(),
        "roaming library listening"
    );

    axum::serve(listener, api_adapters::router(state)).await.context("http server failed")
}

async fn cleanup_ticker(janitor: Arc<ForumJanitor>) {
    let mut interval = tokio::time::interval(CLEANUP_TICK);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if let Some(report) = janitor.tick().await {
            tracing::info!(removed = report.removed_files, cleaned_at = report.cleaned_at, "forum reset");
        }
    }
}
