//! Health check handler.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Health check: pings the user store.
///
/// Returns 200 when the store answers, 503 otherwise. The store error is
/// logged, never returned.
#[tracing::instrument(skip_all, name = "qs.health")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.users.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                database: "healthy".to_string(),
            }),
        ),
        Err(e) => {
            tracing::warn!(target: "qs.health", error = %e, "Health check failed: database error");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    database: "unhealthy".to_string(),
                }),
            )
        }
    }
}
