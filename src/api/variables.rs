use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use super::parse_body;
use crate::error::Result;
use crate::server::state::AppState;
use crate::types::Event;
use crate::variables::{get_value, Command, VariableMutation};

/// Body of a variable mutation
#[derive(Debug, Deserialize)]
pub struct MutationRequest {
    #[serde(default)]
    pub data: serde_json::Value,
}

/// GET /hubs/:hub/variables - Current value of every declared variable.
pub async fn list_handler(
    State(state): State<AppState>,
    Path(hub): Path<String>,
) -> Result<Json<serde_json::Map<String, serde_json::Value>>> {
    let mut values = serde_json::Map::new();
    for (name, var_type) in state.variables.variables(&hub) {
        let value = get_value(state.kv.as_ref(), var_type, &name, &hub).await?;
        values.insert(name, value);
    }
    Ok(Json(values))
}

/// GET /hubs/:hub/variables/:name - Current value of one variable.
pub async fn get_handler(
    State(state): State<AppState>,
    Path((hub, name)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>> {
    let var_type = state.variables.require(&hub, &name)?;
    let value = get_value(state.kv.as_ref(), var_type, &name, &hub).await?;
    let mut body = serde_json::Map::new();
    body.insert(name, value);
    Ok(Json(serde_json::Value::Object(body)))
}

/// POST /hubs/:hub/variables/:name - Add to a variable.
pub async fn add_handler(
    State(state): State<AppState>,
    Path((hub, name)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<Event>> {
    mutate(state, hub, name, Command::Add, body).await
}

/// DELETE /hubs/:hub/variables/:name - Remove from a variable.
pub async fn remove_handler(
    State(state): State<AppState>,
    Path((hub, name)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<Event>> {
    mutate(state, hub, name, Command::Remove, body).await
}

async fn mutate(
    state: AppState,
    hub: String,
    name: String,
    command: Command,
    body: Bytes,
) -> Result<Json<Event>> {
    let request: MutationRequest = parse_body(&body)?;
    let var_type = state.variables.require(&hub, &name)?;

    let event = VariableMutation::parse(&name, var_type, command, &request.data)?.into_event(&hub)?;
    let publisher = state.publisher.clone();
    let published = event.clone();
    state
        .run_publish(move |ctx| async move {
            publisher.publish_events(&ctx, vec![published]).await.into_result()
        })
        .await?;

    tracing::info!(hub = %hub, variable = %name, command = %command, event_id = %event.id, "Variable mutation published");
    Ok(Json(event))
}
