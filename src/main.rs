//! Process entry point: load configuration, wire the store/bus/selector,
//! and serve the HTTP surface until terminated.
//!
//! Grounded on the teacher's `gateway/daemon.rs` (router assembly, listener
//! bind) and `plugins/logging.rs` (`tracing_subscriber` + `tracing-log`
//! init), simplified for a service that owns one fixed, configured port
//! rather than a desktop app hunting for a free one.

use std::sync::Arc;

use kindred_match::config::Config;
use kindred_match::match_engine::MatchEngine;
use kindred_match::notification_bus::RedisNotificationBus;
use kindred_match::selector::Selector;
use kindred_match::session_manager::SessionManager;
use kindred_match::state::AppState;
use kindred_match::store::RedisQueueStore;

#[tokio::main]
async fn main() {
    init_logging();

    let config = Config::from_env();
    tracing::info!(port = config.port, redis_url = %config.redis_url, "starting kindred-match");

    if let Err(err) = run(config).await {
        tracing::error!("kindred-match exited with error: {err}");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), String> {
    let redis_config = deadpool_redis::Config::from_url(&config.redis_url);
    let pool = redis_config
        .create_pool(Some(deadpool_redis::Runtime::Tokio1))
        .map_err(|e| format!("failed to build redis pool: {e}"))?;
    let pubsub_client =
        redis::Client::open(config.redis_url.clone()).map_err(|e| format!("invalid redis url: {e}"))?;

    let store = Arc::new(RedisQueueStore::new(pool));
    let bus = Arc::new(RedisNotificationBus::new(pubsub_client));
    let selector = Arc::new(Selector::new(reqwest::Client::new(), config.discovery_server_url.clone()));
    let sessions = Arc::new(SessionManager::new(store.clone()));
    let engine = Arc::new(MatchEngine::new(
        store.clone(),
        bus.clone(),
        sessions.clone(),
        selector,
        config.popularity_denylist.clone(),
    ));

    let port = config.port;
    let state = AppState::new(engine, sessions, store, bus, config);
    let router = kindred_match::routes::router(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("could not bind {addr}: {e}"))?;
    tracing::info!("kindred-match listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("server error: {e}"))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::warn!("failed to install SIGTERM handler: {err}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received, draining connections");
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .ok();
    tracing_log::LogTracer::init().ok();
}
