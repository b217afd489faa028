use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::errors::AppError;
use crate::AppState;

/// GET /api/config/threshold — current confirmation threshold.
pub async fn get_threshold(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "confirmation_threshold": state.threshold.load(Ordering::Relaxed) }))
}

#[derive(Debug, Deserialize)]
pub struct ThresholdBody {
    pub confirmation_threshold: u32,
}

/// PUT /api/config/threshold — runtime threshold adjustment, no restart.
/// Applies to events processed from this point on.
pub async fn put_threshold(
    State(state): State<AppState>,
    Json(body): Json<ThresholdBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    if body.confirmation_threshold == 0 {
        return Err(AppError::BadRequest(
            "confirmation_threshold must be at least 1".into(),
        ));
    }

    let previous = state
        .threshold
        .swap(body.confirmation_threshold, Ordering::Relaxed);

    tracing::info!(
        previous,
        threshold = body.confirmation_threshold,
        "Confirmation threshold updated via admin API"
    );

    Ok(Json(json!({
        "confirmation_threshold": body.confirmation_threshold,
        "previous": previous,
    })))
}
