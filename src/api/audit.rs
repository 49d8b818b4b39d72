use axum::extract::State;
use axum::Json;

use crate::audit::AuditEntry;
use crate::error::Result;
use crate::server::state::AppState;

/// GET /audit - Audit entries, newest first.
pub async fn list_handler(State(state): State<AppState>) -> Result<Json<Vec<AuditEntry>>> {
    let records = state.publisher.audit().read_all().await?;
    Ok(Json(records.into_iter().map(AuditEntry::project).collect()))
}
