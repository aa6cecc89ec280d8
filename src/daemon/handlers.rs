use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use tracing::warn;

use crate::daemon::api_error::ApiError;
use crate::daemon::logging::{log_key_issued, record_key_request, HealthResponse};
use crate::drkey::issuer::KeyIssuer;
use crate::wire::{Lvl2KeyRequest, Lvl2KeyResponse};

/// Shared application state for handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub issuer: Arc<KeyIssuer>,
}

impl AppState {
    pub fn new(issuer: KeyIssuer) -> Self {
        Self {
            issuer: Arc::new(issuer),
        }
    }
}

/// `GET /health`
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let protocols = state
        .issuer
        .registry()
        .protocols()
        .into_iter()
        .map(str::to_string)
        .collect();
    Json(HealthResponse::healthy(
        state.issuer.schedule().duration().as_secs(),
        protocols,
    ))
}

/// `POST /drkey/v1/lvl2`
///
/// Issues the level-2 key described by the request for the epoch containing
/// `val_time`.
pub async fn lvl2_key_handler(
    State(state): State<AppState>,
    payload: Result<Json<Lvl2KeyRequest>, JsonRejection>,
) -> Result<Json<Lvl2KeyResponse>, ApiError> {
    let Json(req) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected malformed key request");
        ApiError::from(rejection)
    })?;
    record_key_request(&req.meta);

    if req.meta.protocol.trim().is_empty() {
        return Err(ApiError::invalid_request("protocol cannot be empty"));
    }

    let key = state.issuer.issue(&req.meta, req.val_time).map_err(|e| {
        warn!(error = %e, "Key derivation failed");
        ApiError::from(e)
    })?;

    log_key_issued(&key, req.val_time);

    Ok(Json(Lvl2KeyResponse::from(&key)))
}
