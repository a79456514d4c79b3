//! HTTP surface: router assembly over the handlers in this module.

mod matchmaking;
mod session;
mod status;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/matchmaking", get(matchmaking::matchmaking))
        .route("/session/:user_id", get(session::get_session))
        .route("/session/disconnect", post(session::disconnect))
        .route("/cancel_matchmaking", post(session::cancel))
        .route("/interests/popular", get(status::popular))
        .route("/status", get(status::status))
        .route("/maintenance", get(status::maintenance))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
