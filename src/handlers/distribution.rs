// src/handlers/distribution.rs

use super::{ok, Envelope};
use crate::discovery::{distribution_status, DistributionStatus};
use crate::error::Result;
use crate::middleware::{KubeClient, Namespace};
use crate::state::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;

/// Status of the GenAI distribution running in the namespace.
pub async fn get_distribution_status(
    State(state): State<Arc<AppState>>,
    namespace: Namespace,
    KubeClient(client): KubeClient,
) -> Result<Json<Envelope<DistributionStatus>>> {
    let status = distribution_status(client.as_ref(), &state.discovery_kind, namespace.as_str()).await?;
    Ok(ok(status))
}
