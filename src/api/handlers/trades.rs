use axum::extract::{Path, State};
use axum::Json;

use crate::errors::AppError;
use crate::models::Trade;
use crate::AppState;

/// GET /api/trades/:trade_id — trade status plus full audit history.
pub async fn detail(
    State(state): State<AppState>,
    Path(trade_id): Path<String>,
) -> Result<Json<Trade>, AppError> {
    let trade = state
        .trades
        .get_trade(&trade_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("trade {trade_id} not found")))?;

    Ok(Json(trade))
}
