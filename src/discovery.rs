// src/discovery.rs

//! Resolves the GenAI service URL for a namespace from the discovery custom resource.

use crate::clients::kubernetes::{CustomResource, KubernetesClient, ResourceKind};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Summary of the discovery resource shown to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionStatus {
    pub name: String,
    pub phase: String,
    pub version: String,
}

impl From<&CustomResource> for DistributionStatus {
    fn from(resource: &CustomResource) -> Self {
        let text = |pointer: &str| {
            resource
                .status
                .pointer(pointer)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            name: resource.metadata.name.clone(),
            phase: text("/phase"),
            version: text("/version/llamaStackServerVersion"),
        }
    }
}

/// First `kind` instance listed in `namespace`; 404 when there is none.
async fn first_instance(
    client: &dyn KubernetesClient,
    kind: &ResourceKind,
    namespace: &str,
) -> Result<CustomResource> {
    let mut resources = client.list_custom_resources(kind, namespace).await?;
    if resources.is_empty() {
        return Err(AppError::NotFound(format!(
            "no {} found in namespace {namespace}",
            kind.plural
        )));
    }
    if resources.len() > 1 {
        warn!(
            namespace,
            count = resources.len(),
            chosen = %resources[0].metadata.name,
            "Multiple {} found; using the first one listed",
            kind.plural
        );
    }
    Ok(resources.swap_remove(0))
}

/// Name, phase and server version of the namespace's discovery resource.
pub async fn distribution_status(
    client: &dyn KubernetesClient,
    kind: &ResourceKind,
    namespace: &str,
) -> Result<DistributionStatus> {
    let resource = first_instance(client, kind, namespace).await?;
    Ok(DistributionStatus::from(&resource))
}

/// Returns `override_url` when set; otherwise the service URL in the status of
/// the first `kind` instance listed in `namespace`.
///
/// List order comes from the apiserver, so with several instances it is
/// unspecified which one wins.
pub async fn resolve_service_url(
    client: &dyn KubernetesClient,
    kind: &ResourceKind,
    namespace: &str,
    override_url: Option<&str>,
) -> Result<String> {
    if let Some(url) = override_url.filter(|u| !u.trim().is_empty()) {
        debug!(namespace, url, "Using configured GenAI service URL");
        return Ok(url.to_string());
    }

    let first = first_instance(client, kind, namespace).await?;
    match first.service_url() {
        Some(url) if !url.is_empty() => {
            debug!(namespace, name = %first.metadata.name, url, "Discovered GenAI service");
            Ok(url.to_string())
        }
        _ => Err(AppError::ServiceUrlMissing {
            kind: kind.plural.clone(),
            name: first.metadata.name.clone(),
        }),
    }
}
