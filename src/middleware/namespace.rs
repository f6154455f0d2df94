// src/middleware/namespace.rs

use crate::error::AppError;
use crate::validation::is_dns1123_label;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::Span;
use url::form_urlencoded;

/// Validated namespace for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace(pub String);

impl Namespace {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn query_param(request: &Request, name: &str) -> Option<String> {
    let query = request.uri().query()?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Reads and validates the namespace carried in query parameter `param`.
pub fn namespace_from_query(request: &Request, param: &str) -> Result<Namespace, AppError> {
    let value = query_param(request, param)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("missing required query parameter: {param}")))?;
    if !is_dns1123_label(&value) {
        return Err(AppError::BadRequest(format!(
            "invalid {param} {value:?}: must be a lowercase RFC 1123 label"
        )));
    }
    Ok(Namespace(value))
}

async fn attach(param: &str, mut request: Request, next: Next) -> Response {
    match namespace_from_query(&request, param) {
        Ok(namespace) => {
            Span::current().record("namespace", namespace.as_str());
            request.extensions_mut().insert(namespace);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Namespace from `?namespace=`.
pub async fn require_namespace(request: Request, next: Next) -> Response {
    attach("namespace", request, next).await
}

/// Namespace from `?resource=`, as used by the secrets listing.
pub async fn require_resource_namespace(request: Request, next: Next) -> Response {
    attach("resource", request, next).await
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Namespace {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Namespace>()
            .cloned()
            .ok_or_else(|| AppError::BadRequest("missing required query parameter: namespace".into()))
    }
}
