//! End-to-end flows through the full router with both upstreams mocked.

mod common;

use axum::http::StatusCode;
use common::assertions::validation_fields;
use common::{TestApp, MOCK_ADMIN_TOKEN, MOCK_INVALID_TOKEN, MOCK_USER_TOKEN};
use serde_json::json;

#[tokio::test]
async fn list_models_splits_by_type() {
    let app = TestApp::default_mock();
    let response = app.get("/api/v1/models?namespace=ns-a", Some(MOCK_ADMIN_TOKEN)).await;
    let data = response.data(StatusCode::OK);

    assert_eq!(data["models"].as_array().unwrap().len(), 7);
    let llm = data["llm_models"].as_array().unwrap();
    assert_eq!(llm.len(), 4);
    assert_eq!(data["embedding_models"].as_array().unwrap().len(), 3);
    assert!(llm.iter().all(|m| m["type"] == "llm"));
}

#[tokio::test]
async fn model_type_filter_and_validation() {
    let app = TestApp::default_mock();
    let data = app
        .get("/api/v1/models?namespace=ns-a&model_type=embedding", Some(MOCK_ADMIN_TOKEN))
        .await
        .data(StatusCode::OK);
    assert_eq!(data["models"].as_array().unwrap().len(), 3);
    assert!(data["llm_models"].as_array().unwrap().is_empty());

    let error = app
        .get("/api/v1/models?namespace=ns-a&model_type=vision", Some(MOCK_ADMIN_TOKEN))
        .await
        .error(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(validation_fields(&error), vec!["query.model_type"]);
}

#[tokio::test]
async fn callback_with_unknown_state_is_rejected() {
    let app = TestApp::default_mock();
    let response = app
        .post_json(
            "/api/v1/auth/callback",
            None,
            json!({ "code": "abc", "state": "never-issued" }),
        )
        .await;
    let error = response.error(StatusCode::BAD_REQUEST);
    assert!(error["message"].as_str().unwrap().contains("invalid request"));
}

#[tokio::test]
async fn create_vector_store_requires_name() {
    let app = TestApp::default_mock();
    let response = app
        .post_json(
            "/api/v1/vectorstores?namespace=ns-a",
            Some(MOCK_ADMIN_TOKEN),
            json!({ "data": { "metadata": { "k": "v" } } }),
        )
        .await;
    let error = response.error(StatusCode::UNPROCESSABLE_ENTITY);
    let causes = error["cause"]["validation_errors"].as_array().unwrap();
    assert!(causes
        .iter()
        .any(|c| c["field"] == "data.name" && c["type"] == "FieldValueRequired"));
}

#[tokio::test]
async fn create_vector_store_returns_created() {
    let app = TestApp::default_mock();
    let data = app
        .post_json(
            "/api/v1/vectorstores?namespace=ns-a",
            Some(MOCK_ADMIN_TOKEN),
            json!({ "data": { "name": "docs", "metadata": { "team": "rag" } } }),
        )
        .await
        .data(StatusCode::CREATED);
    assert_eq!(data["id"], "vs_mock456");
    assert_eq!(data["name"], "docs");
}

#[tokio::test]
async fn strict_json_rejects_unknown_fields_and_bare_bodies() {
    let app = TestApp::default_mock();
    let unknown = app
        .post_json(
            "/api/v1/vectorstores?namespace=ns-a",
            Some(MOCK_ADMIN_TOKEN),
            json!({ "data": { "name": "docs", "shards": 3 } }),
        )
        .await;
    unknown.error(StatusCode::BAD_REQUEST);

    let bare = app
        .post_json(
            "/api/v1/vectorstores?namespace=ns-a",
            Some(MOCK_ADMIN_TOKEN),
            json!({ "name": "docs" }),
        )
        .await;
    bare.error(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn json_routes_require_json_content_type() {
    let app = TestApp::default_mock();
    let request = common::http::request("POST", "/api/v1/vectorstores?namespace=ns-a", Some(MOCK_ADMIN_TOKEN))
        .header("content-type", "text/plain")
        .body(axum::body::Body::from(r#"{"data":{"name":"docs"}}"#))
        .unwrap();
    app.send(request).await.error(StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn oversized_json_body_is_rejected() {
    let app = TestApp::default_mock();
    let name = "x".repeat(2 * 1024 * 1024);
    let response = app
        .post_json(
            "/api/v1/vectorstores?namespace=ns-a",
            Some(MOCK_ADMIN_TOKEN),
            json!({ "data": { "name": name } }),
        )
        .await;
    response.error(StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn vector_store_lifecycle() {
    let app = TestApp::default_mock();
    let page = app
        .get("/api/v1/vectorstores?namespace=ns-a&limit=5&order=asc", Some(MOCK_ADMIN_TOKEN))
        .await
        .data(StatusCode::OK);
    assert_eq!(page["data"][0]["id"], "vs_mock123");

    let files = app
        .get("/api/v1/vectorstores/vs_mock123/files?namespace=ns-a", Some(MOCK_ADMIN_TOKEN))
        .await
        .data(StatusCode::OK);
    assert_eq!(files["data"][0]["vector_store_id"], "vs_mock123");

    let deleted = app
        .delete("/api/v1/vectorstores/vs_mock123?namespace=ns-a", Some(MOCK_ADMIN_TOKEN))
        .await
        .data(StatusCode::OK);
    assert_eq!(deleted["deleted"], true);
}

#[tokio::test]
async fn vector_store_file_delete_removes_the_file_too() {
    let app = TestApp::default_mock();
    let deleted = app
        .delete(
            "/api/v1/vectorstores/vs_mock123/files/file-mock123?namespace=ns-a",
            Some(MOCK_USER_TOKEN),
        )
        .await
        .data(StatusCode::OK);
    assert_eq!(
        deleted,
        json!({ "id": "file-mock123", "object": "vector_store.file.deleted", "deleted": true })
    );

    app.delete(
        "/api/v1/vectorstores/vs_mock123/files/file-mock123?namespace=ns-b",
        Some(MOCK_USER_TOKEN),
    )
    .await
    .error(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn list_limits_are_validated() {
    let app = TestApp::default_mock();
    let error = app
        .get("/api/v1/vectorstores?namespace=ns-a&limit=500&order=up", Some(MOCK_ADMIN_TOKEN))
        .await
        .error(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(validation_fields(&error), vec!["query.limit", "query.order"]);
}

#[tokio::test]
async fn files_list_and_delete() {
    let app = TestApp::default_mock();
    let page = app
        .get("/api/v1/files?namespace=ns-a&purpose=assistants", Some(MOCK_ADMIN_TOKEN))
        .await
        .data(StatusCode::OK);
    assert_eq!(page["data"][0]["id"], "file-mock123");

    let deleted = app
        .delete("/api/v1/files/file-mock123?namespace=ns-a", Some(MOCK_ADMIN_TOKEN))
        .await
        .data(StatusCode::OK);
    assert_eq!(deleted["id"], "file-mock123");
}

#[tokio::test]
async fn responses_create_and_fetch() {
    let app = TestApp::default_mock();
    let data = app
        .post_json(
            "/api/v1/responses?namespace=ns-a",
            Some(MOCK_ADMIN_TOKEN),
            json!({ "data": {
                "input": "What is RAG?",
                "model": "ollama/llama3.2:3b",
                "vector_store_ids": ["vs_mock123"],
                "chat_context": [{ "role": "user", "content": "hello" }],
                "temperature": 0.2
            }}),
        )
        .await
        .data(StatusCode::OK);
    assert_eq!(data["id"], "resp_mock123");
    assert!(data["content"].as_str().unwrap().ends_with("What is RAG?"));

    let fetched = app
        .get("/api/v1/responses/resp_mock123?namespace=ns-a", Some(MOCK_ADMIN_TOKEN))
        .await
        .data(StatusCode::OK);
    assert_eq!(fetched["status"], "completed");

    app.get("/api/v1/responses/resp_other?namespace=ns-a", Some(MOCK_ADMIN_TOKEN))
        .await
        .error(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn responses_validate_every_field() {
    let app = TestApp::default_mock();
    let error = app
        .post_json(
            "/api/v1/responses?namespace=ns-a",
            Some(MOCK_ADMIN_TOKEN),
            json!({ "data": {
                "input": "",
                "model": "",
                "temperature": 3.5,
                "chat_context": [{ "role": "system", "content": "x" }]
            }}),
        )
        .await
        .error(StatusCode::UNPROCESSABLE_ENTITY);
    let fields = validation_fields(&error);
    for field in ["data.input", "data.model", "data.temperature", "data.chat_context[0].role"] {
        assert!(fields.iter().any(|f| f == field), "missing {field} in {fields:?}");
    }
}

#[tokio::test]
async fn storage_secrets_are_filtered() {
    let app = TestApp::default_mock();
    let data = app
        .get("/api/v1/secrets?resource=ns-a&type=storage", Some(MOCK_ADMIN_TOKEN))
        .await
        .data(StatusCode::OK);
    let items = data.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["type"], "s3");
    assert_eq!(items[0]["name"], "aws-connection-models");
}

#[tokio::test]
async fn secrets_type_and_paging_are_validated() {
    let app = TestApp::default_mock();
    let error = app
        .get("/api/v1/secrets?resource=ns-a&type=tls", Some(MOCK_ADMIN_TOKEN))
        .await
        .error(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(validation_fields(&error), vec!["query.type"]);

    let lls = app
        .get("/api/v1/secrets?resource=ns-b&type=lls", Some(MOCK_ADMIN_TOKEN))
        .await
        .data(StatusCode::OK);
    assert_eq!(lls[0]["type"], "lls");

    let paged = app
        .get("/api/v1/secrets?resource=ns-a&offset=5", Some(MOCK_ADMIN_TOKEN))
        .await
        .data(StatusCode::OK);
    assert!(paged.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn denied_access_review_is_forbidden() {
    let app = TestApp::default_mock();
    let error = app
        .get("/api/v1/models?namespace=ns-b", Some(MOCK_USER_TOKEN))
        .await
        .error(StatusCode::FORBIDDEN);
    assert_eq!(
        error["message"],
        "user does not have permission to access services in this namespace"
    );
}

#[tokio::test]
async fn namespaces_follow_the_caller() {
    let app = TestApp::default_mock();
    let all = app.get("/api/v1/namespaces", Some(MOCK_ADMIN_TOKEN)).await.data(StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 4);

    let mine = app.get("/api/v1/namespaces", Some(MOCK_USER_TOKEN)).await.data(StatusCode::OK);
    assert_eq!(mine, json!([{ "name": "ns-a" }]));

    app.get("/api/v1/namespaces", Some(MOCK_INVALID_TOKEN))
        .await
        .error(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn current_user_comes_from_header_or_cluster() {
    let app = TestApp::default_mock();
    let data = app.get("/api/v1/user", Some(MOCK_ADMIN_TOKEN)).await.data(StatusCode::OK);
    assert_eq!(data, json!({ "username": "kube:admin" }));

    let request = common::http::request("GET", "/api/v1/user", None)
        .header("kubeflow-userid", "alice@example.com")
        .body(axum::body::Body::empty())
        .unwrap();
    let data = app.send(request).await.data(StatusCode::OK);
    assert_eq!(data["username"], "alice@example.com");

    app.get("/api/v1/user", Some(MOCK_INVALID_TOKEN))
        .await
        .error(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn anonymous_user_without_auth() {
    let app = TestApp::new(common::TestConfigBuilder::new().with_auth_disabled().build());
    let data = app.get("/api/v1/user", None).await.data(StatusCode::OK);
    assert_eq!(data["username"], "system:anonymous");
}

#[tokio::test]
async fn distribution_status_per_namespace() {
    let app = TestApp::default_mock();
    let data = app
        .get("/api/v1/llamastack-distribution/status?namespace=ns-a", Some(MOCK_USER_TOKEN))
        .await
        .data(StatusCode::OK);
    assert_eq!(data["name"], "lsd-genai-playground");
    assert_eq!(data["phase"], "Ready");

    // Reported even while the service URL is not yet published.
    let pending = app
        .get("/api/v1/llamastack-distribution/status?namespace=ns-pending", Some(MOCK_ADMIN_TOKEN))
        .await
        .data(StatusCode::OK);
    assert_eq!(pending["phase"], "Initializing");

    app.get("/api/v1/llamastack-distribution/status?namespace=ns-empty", Some(MOCK_ADMIN_TOKEN))
        .await
        .error(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_identity_is_bad_request() {
    let app = TestApp::default_mock();
    let error = app.get("/api/v1/namespaces", None).await.error(StatusCode::BAD_REQUEST);
    assert_eq!(error["message"], "missing RequestIdentity in context");
}

#[tokio::test]
async fn bearer_scheme_without_credential_is_missing_identity() {
    let app = TestApp::default_mock();
    for value in ["Bearer", "Bearer   ", "bearer "] {
        let request = common::http::request("GET", "/api/v1/namespaces", None)
            .header("authorization", value)
            .body(axum::body::Body::empty())
            .unwrap();
        let error = app.send(request).await.error(StatusCode::BAD_REQUEST);
        assert_eq!(error["message"], "missing RequestIdentity in context", "{value:?}");
    }
}

#[tokio::test]
async fn trusted_user_header_is_an_identity() {
    let app = TestApp::default_mock();
    let request = common::http::request("GET", "/api/v1/namespaces", None)
        .header("kubeflow-userid", MOCK_USER_TOKEN)
        .body(axum::body::Body::empty())
        .unwrap();
    let data = app.send(request).await.data(StatusCode::OK);
    assert_eq!(data.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn every_response_is_enveloped() {
    let app = TestApp::default_mock();
    let requests = [
        ("/api/v1/healthcheck", None),
        ("/api/v1/config", None),
        ("/api/v1/models?namespace=ns-a", Some(MOCK_ADMIN_TOKEN)),
        ("/api/v1/models?namespace=ns-b", Some(MOCK_USER_TOKEN)),
        ("/api/v1/models", Some(MOCK_ADMIN_TOKEN)),
        ("/api/v1/namespaces", Some(MOCK_INVALID_TOKEN)),
        ("/api/v1/secrets?resource=ns-a&type=nope", Some(MOCK_ADMIN_TOKEN)),
        ("/api/v1/responses/missing?namespace=ns-a", Some(MOCK_ADMIN_TOKEN)),
        ("/api/v1/no-such-route", None),
        ("/api/v1/secrets?resource=ns-a&type=storage&type=lls", Some(MOCK_ADMIN_TOKEN)),
        ("/api/v1/models?namespace=ns-a&model_type=llm&model_type=embedding", Some(MOCK_ADMIN_TOKEN)),
    ];
    for (uri, token) in requests {
        let response = app.get(uri, token).await;
        let json = response.json();
        let has_data = json.get("data").is_some();
        let has_error = json.get("error").is_some();
        assert!(has_data ^ has_error, "{uri}: {json}");
        if has_error {
            assert_eq!(json["error"]["code"], response.status.as_str(), "{uri}");
        } else {
            assert!(response.status.is_success(), "{uri}");
        }
    }
}

#[tokio::test]
async fn duplicate_query_keys_are_enveloped_bad_requests() {
    let app = TestApp::default_mock();
    for uri in [
        "/api/v1/secrets?resource=ns-a&type=storage&type=lls",
        "/api/v1/models?namespace=ns-a&model_type=llm&model_type=embedding",
        "/api/v1/vectorstores?namespace=ns-a&limit=5&limit=6",
        "/api/v1/files?namespace=ns-a&order=asc&order=desc",
    ] {
        let response = app.get(uri, Some(MOCK_ADMIN_TOKEN)).await;
        assert_eq!(response.headers["content-type"], "application/json", "{uri}");
        let error = response.error(StatusCode::BAD_REQUEST);
        assert!(
            error["message"].as_str().unwrap().contains("duplicate field"),
            "{uri}: {error}"
        );
    }
}
