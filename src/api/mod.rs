pub mod agents;
pub mod audit;
pub mod events;
pub mod health;
pub mod variables;

use axum::body::Bytes;
use axum::routing::get;
use axum::Router;
use serde::de::DeserializeOwned;

use crate::error::{IngestError, Result};
use crate::server::state::AppState;

/// Build the gateway's HTTP routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", axum::routing::post(events::handler))
        .route("/audit", get(audit::list_handler))
        .route("/hubs/:hub/variables", get(variables::list_handler))
        .route(
            "/hubs/:hub/variables/:name",
            get(variables::get_handler)
                .post(variables::add_handler)
                .delete(variables::remove_handler),
        )
        .route("/agents", get(agents::list_handler))
        .route("/v1/opamp", get(agents::opamp_handler))
        .route("/health", get(health::handler))
}

/// Decode a JSON request body, reporting malformed input as a format error
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| IngestError::Format(format!("malformed JSON body: {}", e)))
}
