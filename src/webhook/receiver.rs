use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use metrics::counter;
use serde_json::json;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Event, EventType, Network, WebhookPayload};
use crate::AppState;

use super::signature::verify_signature;

const SIGNATURE_HEADER: &str = "x-signature";

/// `POST /webhooks/:network` — terminate a provider delivery.
///
/// Verifies the HMAC signature over the raw body before anything else,
/// normalizes the payload into an [`Event`], resolves the owning trade via
/// the address book, and enqueues. Never blocks on downstream processing:
/// a full queue is answered with 503 so the provider redelivers.
pub async fn handle_webhook(
    State(state): State<AppState>,
    Path(network): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let network: Network = network
        .parse()
        .map_err(|e: String| AppError::BadRequest(e))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::InvalidSignature)?;

    if let Err(e) = verify_signature(&body, signature, &state.config.webhook_secret) {
        // Never log the secret or the supplied signature.
        tracing::warn!(network = %network, reason = %e, "Webhook signature rejected");
        counter!("events_rejected_auth").increment(1);
        return Err(AppError::InvalidSignature);
    }

    let payload: WebhookPayload = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(network = %network, body_len = body.len(), error = %e, "Malformed webhook payload");
        AppError::BadRequest("malformed payload".into())
    })?;

    if payload.hash.is_empty() {
        return Err(AppError::BadRequest("missing tx hash".into()));
    }
    if payload.addresses.is_empty() {
        return Err(AppError::BadRequest("missing addresses".into()));
    }

    // Attribution: first address the wallet subsystem knows wins.
    let mut trade_id = None;
    for address in &payload.addresses {
        if let Some(found) = state.address_book.resolve_trade_id(address, network).await? {
            trade_id = Some(found);
            break;
        }
    }

    let Some(trade_id) = trade_id else {
        // Not an error: nothing to attribute the event to, drop with a log.
        tracing::info!(
            network = %network,
            tx_hash = %payload.hash,
            "No trade mapped to any payload address, dropping event"
        );
        counter!("events_unattributed").increment(1);
        return Ok(Json(json!({ "status": "unattributed" })));
    };

    let event = build_event(network, trade_id, &payload);

    tracing::info!(
        event_id = %event.event_id,
        trade_id = %event.trade_id,
        network = %network,
        tx_hash = %event.tx_hash,
        confirmations = event.confirmation_count,
        "Webhook accepted"
    );
    counter!("events_received", "network" => network.as_str()).increment(1);

    let event_id = event.event_id.clone();
    state.queue.try_enqueue(event)?;

    Ok(Json(json!({ "status": "accepted", "event_id": event_id })))
}

/// Normalize a verified payload into an internal event. The event id is
/// assigned here, never taken from the provider.
fn build_event(network: Network, trade_id: String, payload: &WebhookPayload) -> Event {
    let mut data = serde_json::Map::new();
    if let Some(total) = payload.total {
        data.insert("total".into(), json!(total));
    }
    if let Some(received) = payload.received {
        data.insert("received".into(), json!(received));
    }
    if let Some(inputs) = &payload.inputs {
        data.insert("inputs".into(), inputs.clone());
    }
    if let Some(outputs) = &payload.outputs {
        data.insert("outputs".into(), outputs.clone());
    }

    Event {
        event_id: Uuid::new_v4().to_string(),
        trade_id,
        network,
        tx_hash: payload.hash.clone(),
        confirmation_count: payload.confirmations,
        event_type: if payload.is_final() {
            EventType::FinalConfirmation
        } else {
            EventType::Confirmation
        },
        timestamp: Utc::now(),
        data,
        retry_count: 0,
    }
}
