//! Metric endpoints.
//!
//! Request/response bodies are `{"value": <i64>}`. Errors use
//! `{"code": "...", "msg": "..."}` with the stable client code.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use rollsum_core::error::{ClientCode, RollsumError};

use crate::app_state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: i64,
}

/// `POST /metric/:key`
///
/// Waits for queue space when the engine is saturated (backpressure).
pub async fn record_metric(
    State(app): State<AppState>,
    Path(key): Path<String>,
    body: Result<Json<MetricValue>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(b) => b,
        Err(rej) => return error_response(&RollsumError::InvalidInput(rej.body_text())),
    };

    match app.engine().submit(&key, req.value).await {
        Ok(()) => (StatusCode::OK, Json(json!({}))).into_response(),
        Err(e) => error_response(&e),
    }
}

/// `GET /metric/:key/sum`
pub async fn get_metric_sum(State(app): State<AppState>, Path(key): Path<String>) -> Json<MetricValue> {
    Json(MetricValue {
        value: app.engine().query_sum(&key),
    })
}

fn status_for(code: ClientCode) -> StatusCode {
    match code {
        ClientCode::InvalidInput => StatusCode::BAD_REQUEST,
        ClientCode::Backpressure | ClientCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ClientCode::InvalidConfig | ClientCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(err: &RollsumError) -> Response {
    let code = err.client_code();
    let body = Json(json!({ "code": code.as_str(), "msg": err.to_string() }));
    let status = status_for(code);

    if code.is_retryable() {
        (status, [(header::RETRY_AFTER, "1")], body).into_response()
    } else {
        (status, body).into_response()
    }
}
