// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! State Passport replay tool
//!
//! Runs a recorded track of location fixes through the full detection
//! pipeline (filter, detector, achievements, notifications, persistence),
//! syncing with the remote store before and after when one is configured.
//!
//! Usage: `state-passport <fixes.json>`

use anyhow::Context;
use state_passport::{
    config::Config,
    db::{HttpRemoteStore, LocalStore},
    services::{
        start_tracking, synchronize, ChannelSink, FactProvider, HttpFactProvider, RegionIndex,
        ReplaySource, SyncService, Tracker, TrackerHandle,
    },
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    let fixes_path = std::env::args()
        .nth(1)
        .context("usage: state-passport <fixes.json>")?;

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        boundaries = %config.boundaries_path,
        data_dir = %config.data_dir,
        "Starting State Passport replay"
    );

    // Boundary failures disable detection but are not fatal.
    let index = Arc::new(RegionIndex::new(config.index.clone()));
    index.load_from_file(&config.boundaries_path);
    if index.is_empty() {
        tracing::warn!("No region boundaries loaded, no entries will be detected");
    }

    let store = LocalStore::open(&config.data_dir).context("Failed to open local store")?;

    let facts = match &config.fact_service_url {
        Some(url) => Facts::Http(HttpFactProvider::new(url, config.notifications.fact_timeout)?),
        None => Facts::Offline,
    };

    let (sink, mut notifications) = ChannelSink::new();
    let printer = tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            tracing::info!(
                title = %notification.title,
                body = %notification.body,
                category = ?notification.category,
                region = %notification.region,
                "Notification"
            );
        }
    });

    let tracker = Tracker::new(
        index.clone(),
        &config,
        store,
        Arc::new(facts),
        Arc::new(sink),
    );
    let (handle, tracker_task) = tracker.spawn();

    let sync = match &config.sync.remote_url {
        Some(url) => {
            let remote = HttpRemoteStore::new(url, config.sync.request_timeout)?;
            Some(SyncService::new(Arc::new(remote), config.sync.clone()))
        }
        None => None,
    };

    if let Some(sync) = &sync {
        sync_round(&handle, sync, "before replay").await;
    }

    let mut source = ReplaySource::from_file(&fixes_path)?;
    let feeder = start_tracking(&mut source, handle.clone())?;
    feeder.await?;

    if let Some(sync) = &sync {
        sync_round(&handle, sync, "after replay").await;
    }

    let snapshot = handle.snapshot().await?;
    tracing::info!(
        visited = snapshot.visits.values().filter(|v| v.is_active).count(),
        earned = snapshot.achievements.values().filter(|a| a.is_earned).count(),
        current = ?snapshot.current_region,
        "Replay finished"
    );

    handle.shutdown();
    tracker_task.await?;
    printer.await?;
    Ok(())
}

/// Sync failures leave local state untouched and are only logged.
async fn sync_round(
    handle: &TrackerHandle,
    sync: &SyncService<HttpRemoteStore>,
    phase: &'static str,
) {
    match synchronize(handle, sync).await {
        Ok(()) => tracing::info!(phase, "Sync round complete"),
        Err(e) => tracing::warn!(phase, error = %e, transient = e.is_transient(), "Sync round failed"),
    }
}

/// Fact source chosen at startup.
enum Facts {
    Http(HttpFactProvider),
    /// No service configured: every welcome uses the generic text.
    Offline,
}

impl FactProvider for Facts {
    async fn fetch_fact(&self, region: &str) -> Option<String> {
        match self {
            Facts::Http(provider) => provider.fetch_fact(region).await,
            Facts::Offline => None,
        }
    }
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("state_passport=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
