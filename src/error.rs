// src/error.rs
use crate::validation::{FieldError, FieldErrorType};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

/// Сообщение для всех 5xx ответов: детали ошибки остаются только в логах.
pub const GENERIC_SERVER_MESSAGE: &str = "the server encountered a problem";

/// Структурированное тело ответа об ошибке: `{"error": {...}}`.
#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorEnvelope {
    pub error: ErrorDetails,
}

/// Детали ошибки. `code` всегда совпадает с HTTP статусом.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<ErrorCause>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorCause {
    pub validation_errors: Vec<FieldError>,
}

impl ErrorDetails {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code: status.as_u16().to_string(),
            message: message.into(),
            cause: None,
        }
    }

    fn with_validation(status: StatusCode, message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self {
            cause: Some(ErrorCause {
                validation_errors: errors,
            }),
            ..Self::new(status, message)
        }
    }
}

/// Builds an error envelope response outside of `AppError`, e.g. for panics.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = Json(ErrorEnvelope {
        error: ErrorDetails::new(status, message),
    });
    (status, body).into_response()
}

/// Classification of apiserver failures, taken from `Status.reason` and the HTTP code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KubeErrorKind {
    NotFound,
    Forbidden,
    Unauthorized,
    Conflict,
    Invalid,
    TooManyRequests,
    Unavailable,
    Transport,
    Other,
}

impl KubeErrorKind {
    pub fn classify(reason: Option<&str>, code: u16) -> Self {
        match (reason, code) {
            (Some("NotFound"), _) | (_, 404) => Self::NotFound,
            (Some("Forbidden"), _) | (_, 403) => Self::Forbidden,
            (Some("Unauthorized"), _) | (_, 401) => Self::Unauthorized,
            (Some("AlreadyExists" | "Conflict"), _) | (_, 409) => Self::Conflict,
            (Some("Invalid"), _) | (_, 422) => Self::Invalid,
            (Some("TooManyRequests"), _) | (_, 429) => Self::TooManyRequests,
            (Some("ServiceUnavailable" | "Timeout"), _) | (_, 503 | 504) => Self::Unavailable,
            _ => Self::Other,
        }
    }
}

/// Typed Kubernetes API error.
#[derive(Error, Debug, Clone)]
#[error("kubernetes api error ({kind:?}, code {code}): {message}")]
pub struct KubeError {
    pub kind: KubeErrorKind,
    pub code: u16,
    pub message: String,
    pub causes: Vec<FieldError>,
}

impl KubeError {
    pub fn new(kind: KubeErrorKind, code: u16, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            causes: Vec::new(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(KubeErrorKind::Transport, 0, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(KubeErrorKind::NotFound, 404, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(KubeErrorKind::Forbidden, 403, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(KubeErrorKind::Unauthorized, 401, message)
    }
}

/// Kind field carried by GenAI client errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenAiErrorKind {
    InvalidRequest,
    Unauthorized,
    NotFound,
    ConnectionFailed,
    Timeout,
    ServerUnavailable,
    Internal,
}

impl GenAiErrorKind {
    fn default_status(self) -> StatusCode {
        match self {
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::ConnectionFailed => StatusCode::BAD_GATEWAY,
            Self::Timeout | Self::ServerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Kind for an upstream HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 409 | 413 | 422 => Self::InvalidRequest,
            401 | 403 => Self::Unauthorized,
            404 => Self::NotFound,
            408 | 504 => Self::Timeout,
            429 | 502 | 503 => Self::ServerUnavailable,
            _ => Self::Internal,
        }
    }
}

/// Typed GenAI client error. An explicit `status` wins over the kind's default mapping.
#[derive(Error, Debug, Clone)]
#[error("genai error ({kind:?}, status {status:?}): {message}")]
pub struct GenAiError {
    pub kind: GenAiErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl GenAiError {
    pub fn new(kind: GenAiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: GenAiErrorKind::from_status(status),
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            GenAiErrorKind::Timeout
        } else if e.is_connect() {
            GenAiErrorKind::ConnectionFailed
        } else if let Some(status) = e.status() {
            return Self::with_status(status.as_u16(), e.to_string());
        } else {
            GenAiErrorKind::Internal
        };
        Self::new(kind, e.to_string())
    }

    fn status_code(&self) -> StatusCode {
        self.status
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or_else(|| self.kind.default_status())
    }
}

/// Object-store error: upstream HTTP status plus the raw XML body.
#[derive(Error, Debug, Clone)]
#[error("object store error (status {status}): {body}")]
pub struct S3Error {
    pub status: u16,
    pub body: String,
}

impl S3Error {
    fn status_code(&self) -> StatusCode {
        if self.body.contains("NoSuchKey") || self.body.contains("NotFound") {
            StatusCode::NOT_FOUND
        } else if self.body.contains("AccessDenied") || self.body.contains("Forbidden") {
            StatusCode::FORBIDDEN
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Представляет возможные ошибки, которые могут возникнуть в приложении.
///
/// Реализует `IntoResponse` для автоматического преобразования ошибок в
/// стандартный конверт `{"error": {code, message, cause?}}`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Reqwest HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Kubernetes(#[from] KubeError),

    #[error(transparent)]
    GenAi(#[from] GenAiError),

    #[error(transparent)]
    ObjectStore(#[from] S3Error),

    #[error("Validation failed: {}", format_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Unsupported media type")]
    UnsupportedMediaType,

    #[error("missing RequestIdentity in context")]
    IdentityMissing,

    #[error("Service URL missing in {kind} '{name}' status")]
    ServiceUrlMissing { kind: String, name: String },

    #[error("Authorization check failed: {0}")]
    AuthzCheckFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("HTTP client build error: {0}")]
    HttpClientBuild(String),

    #[error("Axum error: {0}")]
    Axum(#[from] axum::Error),

    #[error("HTTP response builder error: {0}")]
    HttpResponseBuilder(#[from] axum::http::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppError {
    pub fn config_validation(message: impl Into<String>, field: Option<&str>) -> Self {
        let message = message.into();
        match field {
            Some(field) => Self::Config(format!("{field}: {message}")),
            None => Self::Config(message),
        }
    }

    pub fn validation(error: FieldError) -> Self {
        Self::Validation(vec![error])
    }

    /// Преобразует AppError в HTTP статус и детали ошибки для клиента.
    /// 5xx: полная ошибка пишется в лог (в span запроса с request_id), клиенту уходит общее сообщение.
    pub fn to_status_and_details(&self) -> (StatusCode, ErrorDetails) {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "Request failed");
            let message = match self {
                Self::AuthenticationFailed(_) => "authentication failed",
                _ => GENERIC_SERVER_MESSAGE,
            };
            return (status, ErrorDetails::new(status, message));
        }

        let details = match self {
            Self::Validation(errors) => {
                ErrorDetails::with_validation(status, "validation failed", errors.clone())
            }
            Self::Kubernetes(e) if e.kind == KubeErrorKind::Invalid => {
                let causes = if e.causes.is_empty() {
                    vec![FieldError::new(FieldErrorType::FieldValueInvalid, "", e.message.clone())]
                } else {
                    e.causes.clone()
                };
                ErrorDetails::with_validation(status, e.message.clone(), causes)
            }
            Self::Kubernetes(e) => ErrorDetails::new(status, e.message.clone()),
            Self::GenAi(e) => ErrorDetails::new(status, e.message.clone()),
            Self::ObjectStore(_) if status == StatusCode::NOT_FOUND => {
                ErrorDetails::new(status, "the requested object does not exist")
            }
            Self::ObjectStore(_) => {
                ErrorDetails::new(status, "access to the requested object was denied")
            }
            Self::BadRequest(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::NotFound(msg) => ErrorDetails::new(status, msg.clone()),
            Self::PayloadTooLarge => ErrorDetails::new(status, "request body too large"),
            Self::UnsupportedMediaType => {
                ErrorDetails::new(status, "Content-Type header must be application/json")
            }
            Self::IdentityMissing => ErrorDetails::new(status, "missing RequestIdentity in context"),
            other => ErrorDetails::new(status, other.to_string()),
        };
        warn!(status = status.as_u16(), error = %self, "Request rejected");
        (status, details)
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Kubernetes(e) => match e.kind {
                KubeErrorKind::NotFound => StatusCode::NOT_FOUND,
                KubeErrorKind::Forbidden => StatusCode::FORBIDDEN,
                KubeErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
                KubeErrorKind::Conflict => StatusCode::CONFLICT,
                KubeErrorKind::Invalid => StatusCode::UNPROCESSABLE_ENTITY,
                KubeErrorKind::TooManyRequests | KubeErrorKind::Unavailable => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                KubeErrorKind::Transport | KubeErrorKind::Other => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::GenAi(e) => e.status_code(),
            Self::ObjectStore(e) => e.status_code(),
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) | Self::IdentityMissing => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Reqwest(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            Self::Reqwest(_) => StatusCode::BAD_GATEWAY,
            Self::ServiceUrlMissing { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_)
            | Self::Io(_)
            | Self::AuthzCheckFailed(_)
            | Self::AuthenticationFailed(_)
            | Self::HttpClientBuild(_)
            | Self::Axum(_)
            | Self::HttpResponseBuilder(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.to_status_and_details();
        (status, Json(ErrorEnvelope { error })).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use rstest::rstest;
    use serde_json::Value;

    async fn body_json(error: AppError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");
        let json: Value = serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            panic!(
                "Response body is not valid JSON: {}. Body: {}",
                e,
                String::from_utf8_lossy(&bytes)
            )
        });
        (status, json)
    }

    // Helper to check the structured response
    async fn check_response(error: AppError, expected_status: StatusCode, expected_message: &str) {
        let (status, json) = body_json(error).await;
        assert_eq!(status, expected_status, "Status code mismatch");
        assert!(json.get("data").is_none());
        let error_obj = &json["error"];
        assert_eq!(
            error_obj["code"].as_str(),
            Some(expected_status.as_str()),
            "code must mirror the HTTP status"
        );
        let message = error_obj["message"].as_str().expect("message missing");
        assert!(
            message.contains(expected_message),
            "Expected message '{message}' to contain '{expected_message}'"
        );
    }

    #[rstest]
    #[case(KubeErrorKind::NotFound, StatusCode::NOT_FOUND)]
    #[case(KubeErrorKind::Forbidden, StatusCode::FORBIDDEN)]
    #[case(KubeErrorKind::Unauthorized, StatusCode::UNAUTHORIZED)]
    #[case(KubeErrorKind::Conflict, StatusCode::CONFLICT)]
    #[case(KubeErrorKind::TooManyRequests, StatusCode::SERVICE_UNAVAILABLE)]
    #[case(KubeErrorKind::Other, StatusCode::INTERNAL_SERVER_ERROR)]
    #[tokio::test]
    async fn kubernetes_errors_map_by_kind(#[case] kind: KubeErrorKind, #[case] expected: StatusCode) {
        let err = AppError::from(KubeError::new(kind, 0, "secrets \"x\" not found"));
        let expected_message = if expected.is_server_error() {
            GENERIC_SERVER_MESSAGE
        } else {
            "secrets \"x\""
        };
        check_response(err, expected, expected_message).await;
    }

    #[tokio::test]
    async fn kubernetes_invalid_carries_causes() {
        let mut err = KubeError::new(KubeErrorKind::Invalid, 422, "Secret \"x\" is invalid");
        err.causes = vec![FieldError::required("metadata.name")];
        let (status, json) = body_json(err.into()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let causes = json["error"]["cause"]["validation_errors"].as_array().unwrap();
        assert_eq!(causes.len(), 1);
        assert_eq!(causes[0]["field"], "metadata.name");
        assert_eq!(causes[0]["type"], "FieldValueRequired");
    }

    #[rstest]
    #[case(GenAiErrorKind::InvalidRequest, StatusCode::BAD_REQUEST)]
    #[case(GenAiErrorKind::Unauthorized, StatusCode::UNAUTHORIZED)]
    #[case(GenAiErrorKind::NotFound, StatusCode::NOT_FOUND)]
    #[case(GenAiErrorKind::ConnectionFailed, StatusCode::BAD_GATEWAY)]
    #[case(GenAiErrorKind::Timeout, StatusCode::SERVICE_UNAVAILABLE)]
    #[case(GenAiErrorKind::ServerUnavailable, StatusCode::SERVICE_UNAVAILABLE)]
    #[case(GenAiErrorKind::Internal, StatusCode::INTERNAL_SERVER_ERROR)]
    #[tokio::test]
    async fn genai_errors_map_by_kind(#[case] kind: GenAiErrorKind, #[case] expected: StatusCode) {
        let (status, json) = body_json(GenAiError::new(kind, "model llama not found").into()).await;
        assert_eq!(status, expected);
        let message = json["error"]["message"].as_str().unwrap();
        if expected.is_server_error() {
            assert_eq!(message, GENERIC_SERVER_MESSAGE);
        } else {
            assert_eq!(message, "model llama not found");
        }
    }

    #[tokio::test]
    async fn genai_explicit_status_wins() {
        let err = GenAiError {
            kind: GenAiErrorKind::InvalidRequest,
            status: Some(409),
            message: "vector store exists".into(),
        };
        check_response(err.into(), StatusCode::CONFLICT, "vector store exists").await;
    }

    #[rstest]
    #[case("<Error><Code>NoSuchKey</Code></Error>", StatusCode::NOT_FOUND)]
    #[case("<Error><Code>NotFound</Code></Error>", StatusCode::NOT_FOUND)]
    #[case("<Error><Code>AccessDenied</Code></Error>", StatusCode::FORBIDDEN)]
    #[case("Forbidden", StatusCode::FORBIDDEN)]
    #[case("<Error><Code>SlowDown</Code></Error>", StatusCode::INTERNAL_SERVER_ERROR)]
    #[tokio::test]
    async fn object_store_errors_map_by_body(#[case] body: &str, #[case] expected: StatusCode) {
        let err = S3Error {
            status: 400,
            body: body.to_string(),
        };
        let (status, json) = body_json(err.into()).await;
        assert_eq!(status, expected);
        assert!(!json["error"]["message"].as_str().unwrap().contains("<Error>"));
    }

    #[tokio::test]
    async fn validation_errors_are_422_with_causes() {
        let err = AppError::Validation(vec![
            FieldError::required("data.name"),
            FieldError::too_many("data.metadata", 16),
        ]);
        let (status, json) = body_json(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"]["code"], "422");
        let causes = json["error"]["cause"]["validation_errors"].as_array().unwrap();
        assert_eq!(causes[0]["type"], "FieldValueRequired");
        assert_eq!(causes[1]["type"], "FieldValueTooMany");
    }

    #[tokio::test]
    async fn request_shape_errors() {
        check_response(AppError::PayloadTooLarge, StatusCode::PAYLOAD_TOO_LARGE, "too large").await;
        check_response(
            AppError::UnsupportedMediaType,
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "application/json",
        )
        .await;
        check_response(
            AppError::BadRequest("invalid request body: unknown field `x`".into()),
            StatusCode::BAD_REQUEST,
            "unknown field",
        )
        .await;
        check_response(
            AppError::IdentityMissing,
            StatusCode::BAD_REQUEST,
            "missing RequestIdentity in context",
        )
        .await;
    }

    #[tokio::test]
    async fn server_errors_never_leak_details() {
        check_response(
            AppError::Internal("db password=hunter2".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
            GENERIC_SERVER_MESSAGE,
        )
        .await;
        let (status, json) = body_json(AppError::ServiceUrlMissing {
            kind: "llamastackdistributions".into(),
            name: "lsd".into(),
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["message"], GENERIC_SERVER_MESSAGE);
        assert!(json["error"].get("cause").is_none());
    }

    #[tokio::test]
    async fn authentication_failure_keeps_stable_message() {
        check_response(
            AppError::AuthenticationFailed("token endpoint returned 502".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
            "authentication failed",
        )
        .await;
    }

    #[test]
    fn kube_kind_classification() {
        assert_eq!(KubeErrorKind::classify(Some("AlreadyExists"), 409), KubeErrorKind::Conflict);
        assert_eq!(KubeErrorKind::classify(None, 401), KubeErrorKind::Unauthorized);
        assert_eq!(KubeErrorKind::classify(Some("Invalid"), 422), KubeErrorKind::Invalid);
        assert_eq!(KubeErrorKind::classify(None, 500), KubeErrorKind::Other);
    }
}
