//! `/session/:userId`, `/session/disconnect`, and `/cancel_matchmaking`,
//! following the same `State<T>` + `Json<T>` extractor, `impl IntoResponse`
//! handler shape as the rest of this module.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DisconnectRequest {
    #[serde(rename = "userId", default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(rename = "userId", default)]
    user_id: Option<String>,
}

pub async fn get_session(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return AppError::InvalidInput("userId is required".to_string()).into_response();
    }

    match state.sessions.get_session_for_user(user_id).await {
        Ok(record) => Json(record).into_response(),
        Err(AppError::NotFound(_)) => {
            Json(json!({ "message": "No active session for this user." })).into_response()
        }
        Err(err) => err.into_response(),
    }
}

pub async fn disconnect(State(state): State<AppState>, Json(body): Json<DisconnectRequest>) -> Response {
    let user_id = match required_user_id(body.user_id) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    match state.sessions.end(&user_id).await {
        Ok(true) => StatusCode::OK.into_response(),
        Ok(false) => AppError::NotFound(format!("no active session for user {user_id}")).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn cancel(State(state): State<AppState>, Json(body): Json<CancelRequest>) -> Response {
    let user_id = match required_user_id(body.user_id) {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };

    match state.engine.cancel(&user_id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => err.into_response(),
    }
}

fn required_user_id(raw: Option<String>) -> Result<String, AppError> {
    match raw.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(AppError::InvalidInput("userId is required".to_string())),
    }
}
