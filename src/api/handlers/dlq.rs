use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::errors::AppError;
use crate::models::{DeadLetterEvent, DeadLetterStatus, Network};
use crate::processor::replay_dead_letter;
use crate::AppState;

const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub network: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/dlq — unresolved dead letter entries, newest first.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<DeadLetterEvent>>, AppError> {
    let network = params
        .network
        .map(|n| n.parse::<Network>())
        .transpose()
        .map_err(AppError::BadRequest)?;

    let entries = state
        .dlq
        .list_unresolved(network, params.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;

    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct ResolveBody {
    pub notes: Option<String>,
}

/// POST /api/dlq/:event_id/resolve — mark resolved, audit trail preserved.
pub async fn resolve(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(body): Json<ResolveBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let found = state
        .dlq
        .mark(&event_id, DeadLetterStatus::Resolved, body.notes.as_deref())
        .await?;

    if !found {
        return Err(AppError::NotFound(format!(
            "no dead letter entry for {event_id}"
        )));
    }

    tracing::info!(event_id = %event_id, "DLQ entry manually resolved");
    Ok(Json(json!({ "status": "resolved", "event_id": event_id })))
}

/// POST /api/dlq/:event_id/replay — re-enqueue the original event.
pub async fn replay(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    replay_dead_letter(state.dlq.as_ref(), &state.queue, &event_id).await?;

    Ok(Json(json!({ "status": "superseded", "event_id": event_id })))
}
