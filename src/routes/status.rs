//! `/interests/popular`, `/status`, and `/maintenance`.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AppError;
use crate::state::AppState;
use crate::store::QueueStore;
use crate::util::{chat_session_key, user_interests_key};

const POPULAR_INTERESTS_LIMIT: usize = 8;

pub async fn popular(State(state): State<AppState>) -> Response {
    if state.is_under_maintenance() {
        return AppError::Maintenance.into_response();
    }

    match state.engine.popular_interests(POPULAR_INTERESTS_LIMIT).await {
        Ok(ranked) => {
            let body: Vec<_> = ranked
                .into_iter()
                .map(|(tag, count)| json!({ "interest": tag, "count": count }))
                .collect();
            Json(body).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub async fn status(State(state): State<AppState>) -> Response {
    let service_state = if state.is_under_maintenance() { "maintenance" } else { "ok" };

    // A lightweight read against a key that never exists is enough to tell
    // a live store connection from a dead one without adding a dedicated
    // ping to the `QueueStore` trait.
    let store_state = match state.store.members("__status_probe__").await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    let chat_sessions = state.store.scan_suffixes(&chat_session_key("")).await.unwrap_or_default().len();
    let queued_users = state.store.scan_suffixes(&user_interests_key("")).await.unwrap_or_default().len();

    Json(json!({
        "service": service_state,
        "store": store_state,
        "chatSessions": chat_sessions,
        "queuedUsers": queued_users,
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
        "memoryKb": resident_memory_kb(),
        "host": host_name(),
    }))
    .into_response()
}

pub async fn maintenance(State(state): State<AppState>) -> Response {
    if state.is_under_maintenance() {
        (StatusCode::SERVICE_UNAVAILABLE, "MAINTENANCE").into_response()
    } else {
        (StatusCode::OK, "ACTIVE").into_response()
    }
}

fn host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(target_os = "linux")]
fn resident_memory_kb() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    const PAGE_SIZE_KB: u64 = 4;
    Some(resident_pages * PAGE_SIZE_KB)
}

#[cfg(not(target_os = "linux"))]
fn resident_memory_kb() -> Option<u64> {
    None
}
