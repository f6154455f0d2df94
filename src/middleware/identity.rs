// src/middleware/identity.rs

use crate::error::AppError;
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

/// Stores the caller identity in the request extensions.
///
/// With authentication disabled every caller is the anonymous identity.
pub async fn attach_identity(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = if state.config.auth_disabled() {
        RequestIdentity::anonymous()
    } else {
        match RequestIdentity::from_headers(request.headers(), &state.config.auth) {
            Ok(identity) => identity,
            Err(e) => return e.into_response(),
        }
    };
    debug!(
        user.id = ?identity.user_id,
        user.groups = identity.groups.len(),
        user.has_token = identity.token.is_some(),
        "Caller identified"
    );
    request.extensions_mut().insert(identity);
    next.run(request).await
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestIdentity>()
            .cloned()
            .ok_or(AppError::IdentityMissing)
    }
}
