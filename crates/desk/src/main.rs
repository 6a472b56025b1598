//! Stockroom desk - background order service.
//!
//! Keeps the local order cache in step with the realtime store and purges
//! deleted orders once their retention window has passed.
//!
//! # Architecture
//!
//! - Firebase Realtime Database REST API as the shared order store
//! - `PostgreSQL` as the local order cache
//! - Sync on startup, every `SYNC_INTERVAL_SECS` and when a pending order is added
//! - Purge on startup and every `PURGE_INTERVAL_SECS`

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::Utc;
use sentry::integrations::tracing as sentry_tracing;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockroom_desk::cache::{OrderCache, PgOrderCache, create_pool};
use stockroom_desk::remote::{HttpRemoteStore, RemoteStore};
use stockroom_desk::{DeskConfig, DeskState};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &DeskConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = DeskConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stockroom_desk=info".into());

    // Use JSON format on Fly.io for structured log parsing, text format locally
    let is_fly = std::env::var("FLY_APP_NAME").is_ok();
    let json_layer = is_fly.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!is_fly).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    tracing::info!(?config, "Configuration loaded");

    let pool = create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p stockroom-cli -- migrate

    let remote = HttpRemoteStore::new(&config.remote).expect("Failed to create remote store client");
    let state = DeskState::new(remote, PgOrderCache::new(pool), config.sync_interval);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sync_task = tokio::spawn({
        let state = state.clone();
        let shutdown = shutdown_rx.clone();
        async move { state.sync().run(shutdown).await }
    });

    let purge_task = tokio::spawn(run_purge(state, config.purge_interval, shutdown_rx));

    shutdown_signal().await;
    let _ = shutdown_tx.send(true);

    for task in [sync_task, purge_task] {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Background task panicked");
        }
    }

    tracing::info!("desk stopped");
}

/// Purge expired deleted orders now and on every interval tick.
async fn run_purge<R: RemoteStore, C: OrderCache>(
    state: DeskState<R, C>,
    interval: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = state.retention().purge_expired(Utc::now()).await {
                    e.report("Purge of expired deleted orders failed");
                }
            }
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping background tasks");
}
