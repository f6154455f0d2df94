// src/middleware/request_size_limit.rs

use crate::error::AppError;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header::CONTENT_LENGTH, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

/// Limit for JSON request bodies.
pub const JSON_BODY_LIMIT: usize = 1024 * 1024;
/// Limit for the buffered text fields of a multipart upload.
pub const MULTIPART_FIELDS_LIMIT: usize = 32 * 1024 * 1024;

/// Rejects requests whose declared `Content-Length` exceeds the route limit
/// before the handler starts reading the body.
pub async fn content_length_limit(
    State(limit): State<usize>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method();
    if matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
        let declared = request
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if let Some(length) = declared.filter(|len| *len > limit) {
            warn!(
                content_length = length,
                max_size = limit,
                method = %method,
                "Request rejected: body size exceeds limit"
            );
            return AppError::PayloadTooLarge.into_response();
        }
    }

    next.run(request).await
}
