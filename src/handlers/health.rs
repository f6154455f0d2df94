// src/handlers/health.rs

use super::{ok, Envelope};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Health {
    pub status: String,
    pub version: String,
}

/// Liveness check. No identity, no upstream calls.
pub async fn healthcheck() -> Json<Envelope<Health>> {
    ok(Health {
        status: "available".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
