// src/handlers/openapi.rs

//! Serves the embedded OpenAPI document with its paths rebased onto the
//! configured API prefix.

use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{
    extract::State,
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use serde_yaml::{Mapping, Value};
use std::sync::Arc;

const DOCUMENT: &str = include_str!("../../openapi/genai-bff.yaml");
const DOCUMENT_PREFIX: &str = "/api/v1";

pub const OPENAPI_PATH: &str = "/openapi";
pub const OPENAPI_JSON_PATH: &str = "/openapi.json";
pub const OPENAPI_YAML_PATH: &str = "/openapi.yaml";
pub const SWAGGER_UI_PATH: &str = "/swagger-ui";

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <title>GenAI BFF API</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js" crossorigin></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({ url: "/openapi.json", dom_id: "#swagger-ui" });
    };
  </script>
</body>
</html>
"##;

/// Rewrites every path key under `/api/v1` to start with `prefix` instead.
fn rebase_paths(document: &mut Value, prefix: &str) {
    if prefix == DOCUMENT_PREFIX {
        return;
    }
    let Some(paths) = document.get_mut("paths").and_then(Value::as_mapping_mut) else {
        return;
    };
    let rebased: Mapping = std::mem::take(paths)
        .into_iter()
        .map(|(key, item)| match key.as_str() {
            Some(path) if path == DOCUMENT_PREFIX || path.starts_with("/api/v1/") => {
                let rest = &path[DOCUMENT_PREFIX.len()..];
                (Value::String(format!("{prefix}{rest}")), item)
            }
            _ => (key, item),
        })
        .collect();
    *paths = rebased;
}

/// The document as served for `prefix`.
pub fn document(prefix: &str) -> Result<Value> {
    let mut document: Value = serde_yaml::from_str(DOCUMENT)
        .map_err(|e| AppError::Internal(format!("embedded OpenAPI document is invalid: {e}")))?;
    rebase_paths(&mut document, prefix);
    Ok(document)
}

pub async fn openapi_yaml(State(state): State<Arc<AppState>>) -> Result<Response> {
    let document = document(state.config.api_prefix())?;
    let body = serde_yaml::to_string(&document)
        .map_err(|e| AppError::Internal(format!("failed to render OpenAPI YAML: {e}")))?;
    Ok(([(header::CONTENT_TYPE, "text/yaml")], body).into_response())
}

pub async fn openapi_json(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    let document = document(state.config.api_prefix())?;
    let json = serde_json::to_value(&document)
        .map_err(|e| AppError::Internal(format!("failed to render OpenAPI JSON: {e}")))?;
    Ok(Json(json))
}

pub async fn swagger_ui() -> Html<&'static str> {
    Html(SWAGGER_UI_HTML)
}

pub async fn openapi_redirect() -> Redirect {
    Redirect::temporary(SWAGGER_UI_PATH)
}
