// src/handlers/s3.rs

use crate::clients::s3::S3Credentials;
use crate::error::{AppError, Result};
use crate::middleware::{KubeClient, Namespace};
use crate::state::AppState;
use crate::validation::{FieldError, FieldErrors, QueryParams};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3FileQuery {
    pub secret_name: Option<String>,
    pub bucket: Option<String>,
    pub key: Option<String>,
}

impl S3FileQuery {
    fn validate(self) -> Result<(String, String, String)> {
        let mut errors = FieldErrors::new();
        let mut required = |field: &str, value: Option<String>| {
            let value = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
            if value.is_none() {
                errors.push(FieldError::required(format!("query.{field}")));
            }
            value.unwrap_or_default()
        };
        let secret_name = required("secretName", self.secret_name);
        let bucket = required("bucket", self.bucket);
        let key = required("key", self.key);
        errors.into_result()?;
        Ok((secret_name, bucket, key))
    }
}

/// Streams an object from the bucket named in the query, using the
/// credentials stored in `secretName`. The body is never buffered.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    KubeClient(client): KubeClient,
    namespace: Namespace,
    QueryParams(query): QueryParams<S3FileQuery>,
) -> Result<Response> {
    let (secret_name, bucket, key) = query.validate()?;

    let secret = client.get_secret(namespace.as_str(), &secret_name).await?;
    let credentials = S3Credentials::from_secret(&secret).map_err(AppError::Validation)?;
    let store = state.clients.object_store(credentials);
    let object = store.get_object(&bucket, &key).await?;

    info!(
        namespace = namespace.as_str(),
        secret = %secret_name,
        bucket = %bucket,
        key = %key,
        "Streaming object"
    );
    let content_type = object
        .content_type
        .as_deref()
        .and_then(|v| HeaderValue::from_str(v).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    Ok(([(header::CONTENT_TYPE, content_type)], Body::from_stream(object.body)).into_response())
}
