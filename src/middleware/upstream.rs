// src/middleware/upstream.rs

//! Attaches per-request upstream clients bound to the caller.

use super::namespace::Namespace;
use crate::clients::{GenAiClient, KubernetesClient};
use crate::discovery::resolve_service_url;
use crate::error::{AppError, Result};
use crate::identity::RequestIdentity;
use crate::state::AppState;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

/// Kubernetes client acting as the caller.
#[derive(Clone)]
pub struct KubeClient(pub Arc<dyn KubernetesClient>);

/// GenAI client for the namespace's service, acting as the caller.
#[derive(Clone)]
pub struct GenAi(pub Arc<dyn GenAiClient>);

fn identity(request: &Request) -> Result<RequestIdentity> {
    request
        .extensions()
        .get::<RequestIdentity>()
        .cloned()
        .ok_or(AppError::IdentityMissing)
}

/// The client stored by the authorizer, or a new one for the caller.
async fn kube_client(state: &AppState, request: &mut Request) -> Result<Arc<dyn KubernetesClient>> {
    if let Some(KubeClient(client)) = request.extensions().get::<KubeClient>() {
        return Ok(client.clone());
    }
    let client = state.clients.kubernetes(&identity(request)?).await?;
    request.extensions_mut().insert(KubeClient(client.clone()));
    Ok(client)
}

pub async fn attach_kubernetes(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match kube_client(&state, &mut request).await {
        Ok(_) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

async fn genai_client(state: &AppState, request: &mut Request) -> Result<Arc<dyn GenAiClient>> {
    let identity = identity(request)?;
    if state.clients.is_mock_genai() {
        return state.clients.genai("mock://genai", &identity);
    }
    let namespace = request
        .extensions()
        .get::<Namespace>()
        .cloned()
        .ok_or_else(|| AppError::BadRequest("missing required query parameter: namespace".into()))?;
    let kube = kube_client(state, request).await?;
    let service_url = resolve_service_url(
        kube.as_ref(),
        &state.discovery_kind,
        namespace.as_str(),
        state.config.upstream.llama_stack_url.as_deref(),
    )
    .await?;
    debug!(namespace = %namespace.0, service_url = %service_url, "GenAI client attached");
    state.clients.genai(&service_url, &identity)
}

/// Discovers the namespace's GenAI service and attaches a client for it.
pub async fn attach_genai(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match genai_client(&state, &mut request).await {
        Ok(client) => {
            request.extensions_mut().insert(GenAi(client));
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for KubeClient {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<KubeClient>()
            .cloned()
            .ok_or_else(|| AppError::Internal("kubernetes client not attached to request".into()))
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for GenAi {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<GenAi>()
            .cloned()
            .ok_or_else(|| AppError::Internal("GenAI client not attached to request".into()))
    }
}
