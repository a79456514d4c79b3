//! Shared application state handed to every axum handler.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::config::Config;
use crate::match_engine::MatchEngine;
use crate::notification_bus::RedisNotificationBus;
use crate::session_manager::SessionManager;
use crate::store::RedisQueueStore;

pub type Engine = MatchEngine<RedisQueueStore, RedisNotificationBus>;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub sessions: Arc<SessionManager<RedisQueueStore>>,
    /// Shared with the engine/session manager's own store handle; kept here
    /// too since the `/status` route inspects queue and session key counts
    /// directly rather than through either of those narrower APIs.
    pub store: Arc<RedisQueueStore>,
    pub bus: Arc<RedisNotificationBus>,
    pub config: Arc<Config>,
    pub maintenance: Arc<AtomicBool>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        engine: Arc<Engine>,
        sessions: Arc<SessionManager<RedisQueueStore>>,
        store: Arc<RedisQueueStore>,
        bus: Arc<RedisNotificationBus>,
        config: Config,
    ) -> Self {
        Self {
            engine,
            sessions,
            store,
            bus,
            config: Arc::new(config),
            maintenance: Arc::new(AtomicBool::new(false)),
            started_at: Instant::now(),
        }
    }

    pub fn is_under_maintenance(&self) -> bool {
        self.maintenance.load(Ordering::Relaxed)
    }
}
