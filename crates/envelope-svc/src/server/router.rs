//! Axum router construction.

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::{handlers, state::AppState};

/// Build the application [`Router`] with all routes and middleware attached.
pub fn build(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/encrypt", post(handlers::encrypt))
        .route("/decrypt", post(handlers::decrypt))
        .route("/health", get(handlers::health))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
