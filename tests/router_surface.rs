//! Router-level behaviour: prefix mounting, OpenAPI serving, handler
//! overrides, static assets, CORS, request ids and panic recovery.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    routing::get,
    Json,
};
use common::{TestApp, TestConfigBuilder, MOCK_ADMIN_TOKEN};
use genai_bff::registry::{self, HandlerRegistry};
use genai_bff::REQUEST_ID_HEADER;
use rstest::rstest;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

#[tokio::test]
async fn openapi_paths_follow_the_prefix() {
    let app = TestApp::new(TestConfigBuilder::new().with_prefix("/rag/api/v1").build());
    let response = app.get("/openapi.json", None).await;
    assert_eq!(response.status, StatusCode::OK);
    let document = response.json();
    let paths = document["paths"].as_object().unwrap();
    assert!(paths.contains_key("/rag/api/v1/config"));
    assert!(!paths.contains_key("/api/v1/config"));
    assert!(paths.keys().all(|p| p.starts_with("/rag/api/v1/")));
}

#[tokio::test]
async fn openapi_yaml_and_swagger_ui() {
    let app = TestApp::new(TestConfigBuilder::new().with_prefix("/custom/api/v2").build());

    let yaml = app.get("/openapi.yaml", None).await;
    assert_eq!(yaml.status, StatusCode::OK);
    assert_eq!(yaml.headers[header::CONTENT_TYPE], "text/yaml");
    let document: serde_yaml::Value = serde_yaml::from_str(&yaml.text()).unwrap();
    assert!(document["paths"]["/custom/api/v2/models"].is_mapping());

    let ui = app.get("/swagger-ui", None).await;
    assert_eq!(ui.status, StatusCode::OK);
    assert!(ui.text().contains("SwaggerUIBundle"));

    let redirect = app.get("/openapi", None).await;
    assert!(redirect.status.is_redirection());
    assert_eq!(redirect.headers[header::LOCATION], "/swagger-ui");
}

#[rstest]
#[case("/healthcheck", StatusCode::OK)]
#[case("/rag/api/v1/healthcheck", StatusCode::OK)]
#[case("/rag/api/v1/config", StatusCode::OK)]
#[case("/api/v1/healthcheck", StatusCode::NOT_FOUND)]
#[case("/rag/api/v1/nothing-here", StatusCode::NOT_FOUND)]
#[tokio::test]
async fn api_is_mounted_under_prefix(#[case] uri: &str, #[case] expected: StatusCode) {
    let app = TestApp::new(TestConfigBuilder::new().with_prefix("/rag/api/v1/").build());
    let response = app.get(uri, None).await;
    assert_eq!(response.status, expected, "{uri}");
    if expected == StatusCode::NOT_FOUND {
        response.error(StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn healthcheck_reports_version() {
    let app = TestApp::default_mock();
    let data = app.get("/healthcheck", None).await.data(StatusCode::OK);
    assert_eq!(data["status"], "available");
    assert_eq!(data["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn override_replaces_handler_but_keeps_the_gate() {
    let overrides = HandlerRegistry::new();
    overrides.register(registry::MODELS_LIST, |_, _| {
        get(|| async { Json(json!({ "data": { "models": [], "source": "override" } })) })
    });
    let app = TestApp::with_registry(TestConfigBuilder::new().build(), &overrides);

    let data = app
        .get("/api/v1/models?namespace=ns-a", Some(MOCK_ADMIN_TOKEN))
        .await
        .data(StatusCode::OK);
    assert_eq!(data["source"], "override");

    app.get("/api/v1/models", Some(MOCK_ADMIN_TOKEN))
        .await
        .error(StatusCode::BAD_REQUEST);
    app.get("/api/v1/models?namespace=ns-b", Some(common::MOCK_USER_TOKEN))
        .await
        .error(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn panics_become_internal_errors() {
    let overrides = HandlerRegistry::new();
    overrides.register(registry::HEALTHCHECK, |_, _| {
        get(|| async {
            if std::env::var_os("GENAI_BFF_NEVER_SET").is_none() {
                panic!("handler exploded");
            }
            StatusCode::OK
        })
    });
    let app = TestApp::with_registry(TestConfigBuilder::new().build(), &overrides);
    let error = app
        .get("/api/v1/healthcheck", None)
        .await
        .error(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error["message"], common::assertions::GENERIC_SERVER_MESSAGE);
}

#[tokio::test]
async fn static_assets_with_spa_fallback() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("index.html"), "<html>genai playground</html>").unwrap();
    fs::write(dir.path().join("app.js"), "console.log('ok');").unwrap();
    let app = TestApp::new(
        TestConfigBuilder::new()
            .with_static_assets(dir.path().to_path_buf())
            .build(),
    );

    let script = app.get("/app.js", None).await;
    assert_eq!(script.status, StatusCode::OK);
    assert_eq!(script.text(), "console.log('ok');");

    let deep_link = app.get("/playground/chat/42", None).await;
    assert_eq!(deep_link.status, StatusCode::OK);
    assert!(deep_link.text().contains("genai playground"));

    // Unknown API paths stay JSON.
    app.get("/api/v1/unknown", None).await.error(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cors_allows_configured_origin() {
    let app = TestApp::new(
        TestConfigBuilder::new()
            .with_allowed_origins(&["https://ui.example.com"])
            .build(),
    );
    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/models?namespace=ns-a")
        .header(header::ORIGIN, "https://ui.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
        .body(Body::empty())
        .unwrap();
    let response = app.send(preflight).await;
    assert!(response.status.is_success());
    assert_eq!(
        response.headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://ui.example.com"
    );
    assert_eq!(response.headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

    let foreign = Request::builder()
        .uri("/api/v1/healthcheck")
        .header(header::ORIGIN, "https://evil.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.send(foreign).await;
    assert!(response.headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn no_cors_headers_without_origins() {
    let app = TestApp::default_mock();
    let request = Request::builder()
        .uri("/api/v1/healthcheck")
        .header(header::ORIGIN, "https://ui.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;
    assert!(response.headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn every_response_has_a_request_id() {
    let app = TestApp::default_mock();
    let ok = app.get("/api/v1/healthcheck", None).await;
    let failed = app.get("/api/v1/models", Some(MOCK_ADMIN_TOKEN)).await;

    let id = |headers: &axum::http::HeaderMap| -> uuid::Uuid {
        headers[REQUEST_ID_HEADER].to_str().unwrap().parse().unwrap()
    };
    assert_ne!(id(&ok.headers), id(&failed.headers));
}

#[tokio::test]
async fn wrong_method_is_rejected() {
    let app = TestApp::default_mock();
    let response = app
        .send(
            Request::builder()
                .method(Method::PUT)
                .uri("/api/v1/healthcheck")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
}
