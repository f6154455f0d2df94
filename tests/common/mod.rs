//! Common test utilities and fixtures
#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use genai_bff::{
    clients::{ClientFactory, MockCluster},
    config::{AppConfig, AuthMethod},
    create_router_with,
    registry::HandlerRegistry,
    AppState,
};
use serde_json::Value;
use std::{path::PathBuf, sync::Arc};
use tower::ServiceExt;

pub use genai_bff::clients::kubernetes_mock::{
    MOCK_ADMIN_TOKEN, MOCK_INVALID_TOKEN, MOCK_SERVICE_URL, MOCK_USER_TOKEN,
};

/// Test configuration builder. Starts with both upstreams mocked.
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.server.test_mode = true;
        config.server.port = 0;
        config.upstream.mock_k8s_client = true;
        config.upstream.mock_ls_client = true;
        Self { config }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.server.api_path_prefix = prefix.into();
        self
    }

    pub fn with_auth_disabled(mut self) -> Self {
        self.config.auth.method = AuthMethod::Disabled;
        self
    }

    /// Real GenAI client; the service URL comes from discovery unless pinned.
    pub fn with_real_genai(mut self) -> Self {
        self.config.upstream.mock_ls_client = false;
        self
    }

    pub fn with_llama_stack_url(mut self, url: impl Into<String>) -> Self {
        self.config.upstream.mock_ls_client = false;
        self.config.upstream.llama_stack_url = Some(url.into());
        self
    }

    pub fn with_apiserver(mut self, url: impl Into<String>) -> Self {
        self.config.upstream.mock_k8s_client = false;
        self.config.kubernetes.api_url = Some(url.into());
        self
    }

    pub fn with_oauth(mut self, server_url: impl Into<String>) -> Self {
        self.config.oauth.enabled = true;
        self.config.oauth.server_url = server_url.into();
        self.config.oauth.client_id = "genai-bff".to_string();
        self.config.oauth.client_secret = "s3cr3t".to_string();
        self.config.oauth.redirect_uri = "https://bff.example.com/callback".to_string();
        self.config.oauth.token_timeout_secs = 2;
        self
    }

    pub fn with_allowed_origins(mut self, origins: &[&str]) -> Self {
        self.config.server.allowed_origins = origins.iter().map(|o| o.to_string()).collect();
        self
    }

    pub fn with_static_assets(mut self, dir: PathBuf) -> Self {
        self.config.server.static_assets_dir = Some(dir);
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Router under test plus the state behind it.
pub struct TestApp {
    pub state: Arc<AppState>,
    pub router: Router,
}

impl TestApp {
    pub fn new(config: AppConfig) -> Self {
        Self::with_registry(config, &HandlerRegistry::new())
    }

    pub fn with_registry(config: AppConfig, registry: &HandlerRegistry) -> Self {
        let state = Arc::new(AppState::new(config).expect("state should build"));
        let router = create_router_with(state.clone(), registry);
        Self { state, router }
    }

    /// Mock Kubernetes mode backed by `cluster` instead of the default fixture.
    pub fn with_cluster(config: AppConfig, cluster: MockCluster) -> Self {
        let clients = ClientFactory::from_config(&config)
            .expect("client factory should build")
            .with_mock_cluster(cluster);
        let state = Arc::new(AppState::with_clients(config, clients));
        let router = create_router_with(state.clone(), &HandlerRegistry::new());
        Self { state, router }
    }

    pub fn default_mock() -> Self {
        Self::new(TestConfigBuilder::new().build())
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        TestResponse {
            status,
            headers,
            body: body.to_vec(),
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(http::get_request(uri, token)).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(http::json_request("POST", uri, token, body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(http::request("DELETE", uri, token).body(Body::empty()).unwrap())
            .await
    }
}

/// Buffered response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!(
                "response body should be JSON ({e}): {}",
                String::from_utf8_lossy(&self.body)
            )
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Asserts the status and the `{data}` envelope, returning `data`.
    pub fn data(&self, expected: StatusCode) -> Value {
        assert_eq!(self.status, expected, "unexpected status, body: {}", self.text());
        let json = self.json();
        assert!(json.get("error").is_none(), "success carried an error: {json}");
        json.get("data")
            .cloned()
            .unwrap_or_else(|| panic!("missing data envelope: {json}"))
    }

    /// Asserts the status and the error envelope, returning `error`.
    pub fn error(&self, expected: StatusCode) -> Value {
        assert_eq!(self.status, expected, "unexpected status, body: {}", self.text());
        assertions::assert_error_envelope(&self.json(), expected)
    }
}

/// Test utilities for HTTP requests
pub mod http {
    use axum::{body::Body, http::request::Builder, http::Request};
    use serde_json::Value;

    pub fn request(method: &str, uri: &str, token: Option<&str>) -> Builder {
        let builder = Request::builder().method(method).uri(uri);
        match token {
            Some(token) => builder.header("Authorization", format!("Bearer {token}")),
            None => builder,
        }
    }

    pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
        request("GET", uri, token).body(Body::empty()).unwrap()
    }

    pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        request(method, uri, token)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Hand-built `multipart/form-data` body: text fields in order, then the file.
    pub fn multipart_body(boundary: &str, fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                    .as_bytes(),
            );
        }
        if let Some((filename, content)) = file {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: text/plain\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        body
    }
}

/// Test assertions and utilities
pub mod assertions {
    use axum::http::StatusCode;
    use serde_json::Value;

    pub const GENERIC_SERVER_MESSAGE: &str = "the server encountered a problem";

    pub fn assert_error_envelope(json: &Value, status: StatusCode) -> Value {
        assert!(json.get("data").is_none(), "error carried data: {json}");
        let error = json
            .get("error")
            .cloned()
            .unwrap_or_else(|| panic!("missing error envelope: {json}"));
        assert_eq!(error["code"].as_str(), Some(status.as_str()), "error code: {json}");
        assert!(
            error["message"].as_str().is_some_and(|m| !m.is_empty()),
            "error message: {json}"
        );
        if status.is_server_error() && status != StatusCode::INTERNAL_SERVER_ERROR {
            return error;
        }
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            let message = error["message"].as_str().unwrap_or_default();
            assert!(
                message == GENERIC_SERVER_MESSAGE || message == "authentication failed",
                "500 leaked details: {json}"
            );
        }
        error
    }

    /// Field names listed under `cause.validation_errors`.
    pub fn validation_fields(error: &Value) -> Vec<String> {
        error["cause"]["validation_errors"]
            .as_array()
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|e| e["field"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
