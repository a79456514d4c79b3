//! `GET /matchmaking`: the server-push matchmaking stream.
//!
//! Adapted from a subscribe-then-forward loop, but one-shot and
//! server-to-client only: a waiting caller gets exactly one `WAITING` frame
//! followed by exactly one `MATCHED` frame, or an immediate
//! `MATCHED`/`MAINTENANCE`/`ERROR` frame, and the stream always ends after
//! its terminal frame.

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use axum::http::StatusCode;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::model::{MatchedNotification, Outcome};
use crate::notification_bus::NotificationBus;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MatchmakingQuery {
    #[serde(rename = "userId", default)]
    user_id: Option<String>,
    #[serde(default)]
    interest: Option<String>,
}

pub async fn matchmaking(State(state): State<AppState>, Query(query): Query<MatchmakingQuery>) -> Response {
    if state.is_under_maintenance() {
        return terminal_frame(StatusCode::SERVICE_UNAVAILABLE, &json!({
            "state": "MAINTENANCE",
            "message": "service is in maintenance mode",
        }));
    }

    let user_id = match query.user_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            return terminal_frame(
                StatusCode::BAD_REQUEST,
                &json!({ "state": "ERROR", "message": "userId is required" }),
            );
        }
    };

    let interests: Vec<String> = query
        .interest
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::to_string)
        .filter(|s| !s.trim().is_empty())
        .collect();

    match state.engine.find_or_queue(&user_id, interests).await {
        Ok(Outcome::Matched { partner_user_id, common_interests, chat_id, chat_server_url }) => {
            let notification = MatchedNotification::new(partner_user_id, &common_interests, chat_id, chat_server_url);
            terminal_frame(StatusCode::OK, &notification)
        }
        Ok(Outcome::Waiting) => wait_for_match(state, user_id),
        Err(err) => terminal_frame(err.status_code(), &json!({ "state": "ERROR", "message": err.to_string() })),
    }
}

/// Build a response that streams a single SSE frame and then ends, used for
/// every path that doesn't need to wait on the notification bus.
fn terminal_frame(status: StatusCode, body: &impl serde::Serialize) -> Response {
    let payload = serde_json::to_string(body).unwrap_or_default();
    let stream = tokio_stream::once(Ok::<_, Infallible>(Event::default().data(payload)));
    let mut response = Sse::new(stream).into_response();
    *response.status_mut() = status;
    response
}

/// The caller is enqueued: emit `WAITING` immediately, then hold the
/// connection open until either a `MATCHED` notification arrives on this
/// user's channel or the client disconnects, at which point the search is
/// cancelled.
fn wait_for_match(state: AppState, user_id: String) -> Response {
    let (tx, rx) = mpsc::channel::<Event>(2);
    let waiting = serde_json::to_string(&json!({ "state": "WAITING" })).unwrap_or_default();
    let _ = tx.try_send(Event::default().data(waiting));

    tokio::spawn(async move {
        let mut notifications = match state.bus.subscribe(&user_id).await {
            Ok(stream) => stream,
            Err(err) => {
                log::warn!("matchmaking: failed to subscribe {user_id} to match notifications: {err}");
                let _ = state.engine.cancel(&user_id).await;
                return;
            }
        };

        tokio::select! {
            notification = notifications.next() => {
                if let Some(notification) = notification {
                    let payload = serde_json::to_string(&notification).unwrap_or_default();
                    let _ = tx.send(Event::default().data(payload)).await;
                }
            }
            _ = tx.closed() => {
                log::debug!("matchmaking: client for {user_id} disconnected while waiting");
            }
        }

        if let Err(err) = state.engine.cancel(&user_id).await {
            log::warn!("matchmaking: cleanup cancel failed for {user_id}: {err}");
        }
    });

    let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}
