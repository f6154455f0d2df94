// src/middleware/authorize.rs

use super::namespace::Namespace;
use super::upstream::KubeClient;
use crate::clients::kubernetes::{AccessReview, ResourceKind};
use crate::error::{AppError, KubeErrorKind};
use crate::identity::RequestIdentity;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{info, warn};

pub const NAMESPACE_DENIED_MESSAGE: &str =
    "user does not have permission to access services in this namespace";

/// Verb and resource the caller must be allowed on in the request namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    pub verb: &'static str,
    pub group: String,
    pub resource: String,
}

impl AccessRule {
    /// `list` on the discovery custom resource; gates every GenAI route.
    pub fn genai(kind: &ResourceKind) -> Self {
        Self {
            verb: "list",
            group: kind.group.clone(),
            resource: kind.plural.clone(),
        }
    }

    pub fn list_secrets() -> Self {
        Self {
            verb: "list",
            group: String::new(),
            resource: "secrets".to_string(),
        }
    }

    pub fn get_secrets() -> Self {
        Self {
            verb: "get",
            ..Self::list_secrets()
        }
    }
}

/// Middleware state: shared app state plus the rule for this route group.
#[derive(Clone)]
pub struct Gate {
    pub state: Arc<AppState>,
    pub rule: AccessRule,
}

impl Gate {
    pub fn new(state: Arc<AppState>, rule: AccessRule) -> Self {
        Self { state, rule }
    }
}

async fn check(gate: &Gate, request: &mut Request) -> Result<(), AppError> {
    let identity = request
        .extensions()
        .get::<RequestIdentity>()
        .cloned()
        .ok_or(AppError::IdentityMissing)?;
    let namespace = request
        .extensions()
        .get::<Namespace>()
        .cloned()
        .ok_or_else(|| AppError::BadRequest("missing required query parameter: namespace".into()))?;

    let client = gate.state.clients.kubernetes(&identity).await?;
    // With a bearer token the review is self-scoped; trusted headers name the subject.
    let (user, groups) = match &identity.token {
        Some(_) => (None, Vec::new()),
        None => (identity.user_id.clone(), identity.groups.clone()),
    };
    let review = AccessReview {
        namespace: namespace.0.clone(),
        verb: gate.rule.verb.to_string(),
        group: gate.rule.group.clone(),
        resource: gate.rule.resource.clone(),
        user,
        groups,
    };

    match client.subject_access_review(&review).await {
        Ok(true) => {
            request.extensions_mut().insert(KubeClient(client));
            Ok(())
        }
        Ok(false) => {
            info!(
                namespace = %namespace.0,
                verb = review.verb,
                resource = %review.resource,
                user.id = ?identity.user_id,
                "Namespace access denied"
            );
            Err(AppError::Forbidden(NAMESPACE_DENIED_MESSAGE.to_string()))
        }
        Err(e) => match e.kind {
            KubeErrorKind::Unauthorized => {
                Err(AppError::Unauthorized("authentication failed".to_string()))
            }
            KubeErrorKind::Forbidden => {
                Err(AppError::Forbidden("insufficient permissions".to_string()))
            }
            _ => {
                warn!(namespace = %namespace.0, error = %e, "Access review failed");
                Err(AppError::AuthzCheckFailed(e.to_string()))
            }
        },
    }
}

/// Gates the route on a SubjectAccessReview for the request namespace.
/// Skipped entirely when authentication is disabled.
pub async fn authorize(State(gate): State<Gate>, mut request: Request, next: Next) -> Response {
    if gate.state.config.auth_disabled() {
        return next.run(request).await;
    }
    match check(&gate, &mut request).await {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
