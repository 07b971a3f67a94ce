use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Liveness plus storage reachability.
pub async fn health_check(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "storage": "ok" })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed: storage unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "storage": "unreachable" })),
            )
                .into_response()
        }
    }
}
