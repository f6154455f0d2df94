// src/handlers/auth.rs

use super::{ok, Envelope};
use crate::error::{AppError, Result};
use crate::oauth::CallbackRequest;
use crate::state::AppState;
use crate::validation::JsonBody;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct IssuedState {
    pub state: String,
}

/// Issues a one-shot CSRF state for the authorization redirect.
pub async fn issue_state(State(state): State<Arc<AppState>>) -> Json<Envelope<IssuedState>> {
    let issued = state.oauth_states.issue();
    info!("Issued OAuth state");
    ok(IssuedState { state: issued })
}

/// Validates the state, then exchanges the code for a token.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<CallbackRequest>,
) -> Result<Json<Envelope<Value>>> {
    if request.code.is_empty() || request.state.is_empty() {
        return Err(AppError::BadRequest(
            "invalid request: code and state are required".into(),
        ));
    }
    if !state.oauth_states.validate(&request.state) {
        warn!("OAuth callback with unknown, reused or expired state");
        return Err(AppError::BadRequest(
            "invalid request: state is invalid or expired".into(),
        ));
    }
    let exchanger = state
        .token_exchanger
        .as_ref()
        .ok_or_else(|| AppError::NotFound("OAuth is not enabled".into()))?;
    let token = exchanger.exchange(&request.code).await?;
    Ok(ok(token))
}
