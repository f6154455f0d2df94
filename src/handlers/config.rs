// src/handlers/config.rs

use super::{ok, Envelope};
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Public OAuth settings the browser needs to start the authorization flow.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfig {
    pub oauth_enabled: bool,
    pub oauth_client_id: String,
    pub oauth_redirect_uri: String,
    pub oauth_server_url: String,
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<Envelope<PublicConfig>> {
    let oauth = &state.config.oauth;
    ok(PublicConfig {
        oauth_enabled: oauth.enabled,
        oauth_client_id: oauth.client_id.clone(),
        oauth_redirect_uri: oauth.redirect_uri.clone(),
        oauth_server_url: oauth.server_url.clone(),
    })
}
