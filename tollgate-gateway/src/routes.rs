//! Route handlers for the protected data surface.
//!
//! The full per-endpoint surface lives behind the same pattern shown here:
//! a handler resolves its upstream call through the shared token bucket, so
//! client concurrency never multiplies into upstream volume.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tollgate::limiter::{ScheduleError, TokenBucket};

use crate::upstream::UpstreamClient;

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Admission control towards the upstream API.
    pub limiter: Arc<TokenBucket>,
    /// The upstream data API.
    pub upstream: Arc<UpstreamClient>,
}

/// `GET /data/address/{address}` — proxies address data from the upstream
/// API through the rate limiter.
pub async fn address_data(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Response {
    let upstream = Arc::clone(&state.upstream);
    let scheduled = state
        .limiter
        .schedule(async move { upstream.address_data(&address).await });

    let pending = match scheduled {
        Ok(pending) => pending,
        Err(ScheduleError::QueueFull) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": "upstream at capacity, retry later" })),
            )
                .into_response();
        }
        Err(ScheduleError::Closed) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": "upstream scheduler unavailable" })),
            )
                .into_response();
        }
    };

    match pending.await {
        Ok(Ok(value)) => Json(value).into_response(),
        Ok(Err(err)) => {
            tracing::warn!(%err, "upstream call failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": "upstream request failed" })),
            )
                .into_response()
        }
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "upstream scheduler unavailable" })),
        )
            .into_response(),
    }
}

/// `GET /health` — liveness and version.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
