// src/handlers/user.rs

use super::{ok, Envelope};
use crate::error::Result;
use crate::identity::RequestIdentity;
use crate::middleware::KubeClient;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CurrentUser {
    pub username: String,
}

/// The caller's username: the trusted user header when present, otherwise
/// whatever the apiserver reports for the caller's token.
pub async fn get_current_user(
    identity: RequestIdentity,
    KubeClient(client): KubeClient,
) -> Result<Json<Envelope<CurrentUser>>> {
    let username = match identity.user_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => id,
        None => client.current_user().await?,
    };
    Ok(ok(CurrentUser { username }))
}
