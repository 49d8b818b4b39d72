use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use crate::server::state::AppState;

/// GET /health - Bus health.
pub async fn handler(State(state): State<AppState>) -> impl IntoResponse {
    let provider = state.publisher.provider();
    let (status, healthy, error) = match provider.health().await {
        Ok(true) => (StatusCode::OK, true, None),
        Ok(false) => (StatusCode::SERVICE_UNAVAILABLE, false, None),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, false, Some(e.to_string())),
    };

    let body = serde_json::json!({
        "status": if healthy { "ok" } else { "unavailable" },
        "provider": provider.name(),
        "agents": state.agents.len(),
        "error": error,
    });
    (status, Json(body))
}
