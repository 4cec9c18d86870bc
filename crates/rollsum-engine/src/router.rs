//! Axum router wiring.
//!
//! - `POST /metric/:key`     : record a value
//! - `GET  /metric/:key/sum` : windowed sum
//! - `/healthz`, `/readyz`, `/metrics` : operational endpoints

use axum::{
    routing::{get, post},
    Router,
};

use crate::{app_state::AppState, ops, transport};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/metric/:key", post(transport::http::record_metric))
        .route("/metric/:key/sum", get(transport::http::get_metric_sum))
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .with_state(state)
}
