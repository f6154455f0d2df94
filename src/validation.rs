// src/validation.rs

//! Request validation: field-error accumulation, strict JSON bodies and the
//! DNS-1123 label check used for namespaces.

use crate::error::AppError;
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{header, request::Parts, HeaderMap, StatusCode},
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

static DNS1123_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("static regex"));

pub const DNS1123_LABEL_MAX_LEN: usize = 63;

/// Returns true for a valid Kubernetes namespace name.
pub fn is_dns1123_label(value: &str) -> bool {
    !value.is_empty() && value.len() <= DNS1123_LABEL_MAX_LEN && DNS1123_LABEL.is_match(value)
}

/// Error categories, named after the apiserver's field error reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldErrorType {
    FieldValueRequired,
    FieldValueInvalid,
    FieldValueNotSupported,
    FieldValueTooLong,
    FieldValueTooMany,
    FieldValueDuplicate,
    FieldValueForbidden,
}

impl FieldErrorType {
    /// Maps an apiserver `StatusCause.reason` onto a field error type.
    pub fn from_reason(reason: &str) -> Self {
        match reason {
            "FieldValueRequired" => Self::FieldValueRequired,
            "FieldValueNotSupported" => Self::FieldValueNotSupported,
            "FieldValueTooLong" => Self::FieldValueTooLong,
            "FieldValueTooMany" => Self::FieldValueTooMany,
            "FieldValueDuplicate" => Self::FieldValueDuplicate,
            "FieldValueForbidden" => Self::FieldValueForbidden,
            _ => Self::FieldValueInvalid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(rename = "type")]
    pub kind: FieldErrorType,
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(kind: FieldErrorType, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn required(field: impl Into<String>) -> Self {
        Self::new(FieldErrorType::FieldValueRequired, field, "Required value")
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FieldErrorType::FieldValueInvalid, field, message)
    }

    pub fn not_supported(field: impl Into<String>, value: &str, allowed: &[&str]) -> Self {
        Self::new(
            FieldErrorType::FieldValueNotSupported,
            field,
            format!("Unsupported value: {value:?}: supported values: {}", allowed.join(", ")),
        )
    }

    pub fn too_long(field: impl Into<String>, max: usize) -> Self {
        Self::new(
            FieldErrorType::FieldValueTooLong,
            field,
            format!("must have at most {max} characters"),
        )
    }

    pub fn too_many(field: impl Into<String>, max: usize) -> Self {
        Self::new(
            FieldErrorType::FieldValueTooMany,
            field,
            format!("must have at most {max} items"),
        )
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Accumulates field errors across a whole request before failing.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks a numeric bound, recording a `FieldValueInvalid` when it fails.
    pub fn check_range<T>(&mut self, field: &str, value: T, min: T, max: T)
    where
        T: PartialOrd + fmt::Display + Copy,
    {
        if value < min || value > max {
            self.push(FieldError::invalid(
                field,
                format!("must be between {min} and {max}, got {value}"),
            ));
        }
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.0))
        }
    }
}

fn has_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// JSON body extractor with strict semantics: `application/json` is required (415),
/// the route body limit applies (413) and malformed JSON is a 400. Unknown fields are
/// rejected through `#[serde(deny_unknown_fields)]` on the target type.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !has_json_content_type(req.headers()) {
            return Err(AppError::UnsupportedMediaType);
        }
        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                AppError::PayloadTooLarge
            } else {
                AppError::BadRequest(rejection.body_text())
            }
        })?;
        serde_json::from_slice(&bytes)
            .map(JsonBody)
            .map_err(|e| AppError::BadRequest(format!("invalid request body: {e}")))
    }
}

/// Query string extractor whose rejections use the error envelope.
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| QueryParams(value))
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RequestEnvelope<T> {
    data: T,
}

/// Strict JSON body wrapped in the `{"data": ...}` request envelope.
pub struct StrictJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for StrictJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let JsonBody(envelope) = JsonBody::<RequestEnvelope<T>>::from_request(req, state).await?;
        Ok(StrictJson(envelope.data))
    }
}
