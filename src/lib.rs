// src/lib.rs

pub mod cli;
pub mod clients;
pub mod config;
pub mod discovery;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod oauth;
pub mod registry;
pub mod state;
pub mod validation;

use crate::handlers::{
    auth, config as config_handler, distribution, files, health, models, namespaces, openapi,
    responses, s3, secrets, user, vectorstores,
};
use crate::middleware::{
    attach_genai, attach_identity, attach_kubernetes, authorize, content_length_limit, cors_layer,
    recovery_layer, require_namespace, require_resource_namespace, AccessRule, Gate,
    JSON_BODY_LIMIT,
};
use crate::registry::HandlerRegistry;
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Request as AxumRequest},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Instant};
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

// Пере-экспорт ключевых типов для удобства использования
pub use config::AppConfig;
pub use error::{AppError, Result};
pub use state::AppState;

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

type ApiRouter = Router<Arc<AppState>>;

/// Builds the router with the process-wide handler registry.
pub fn create_router(state: Arc<AppState>) -> Router {
    create_router_with(state, registry::global())
}

/// Builds the router, asking `overrides` for every handler by id.
pub fn create_router_with(state: Arc<AppState>, overrides: &HandlerRegistry) -> Router {
    let prefix = state.config.api_prefix().to_string();

    let api = Router::new()
        .merge(public_routes(&state, overrides))
        .merge(genai_routes(&state, overrides))
        .merge(kubernetes_routes(&state, overrides));

    let mut router = Router::new()
        .route(openapi::OPENAPI_PATH, get(openapi::openapi_redirect))
        .route(openapi::OPENAPI_JSON_PATH, get(openapi::openapi_json))
        .route(openapi::OPENAPI_YAML_PATH, get(openapi::openapi_yaml))
        .route(openapi::SWAGGER_UI_PATH, get(openapi::swagger_ui));

    // Пустой префикс: API монтируется в корень, отдельный /healthcheck не нужен
    router = if prefix.is_empty() {
        router.merge(api)
    } else {
        router
            .route(
                "/healthcheck",
                overrides.resolve(registry::HEALTHCHECK, &state, || get(health::healthcheck)),
            )
            .nest(&prefix, api.fallback(not_found))
    };

    router = match &state.config.server.static_assets_dir {
        Some(dir) => {
            info!(static_assets.dir = %dir.display(), "Serving static assets");
            let spa = ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")));
            router.fallback_service(spa)
        }
        None => router.fallback(not_found),
    };

    let mut router = router.with_state(state.clone());
    if let Some(cors) = cors_layer(&state.config.server.allowed_origins) {
        router = router.layer(cors);
    }
    router
        .layer(from_fn(trace_requests))
        .layer(recovery_layer())
}

/// Health, public config and the OAuth flow. No identity required.
fn public_routes(state: &Arc<AppState>, overrides: &HandlerRegistry) -> ApiRouter {
    Router::new()
        .route(
            "/healthcheck",
            overrides.resolve(registry::HEALTHCHECK, state, || get(health::healthcheck)),
        )
        .route(
            "/config",
            overrides.resolve(registry::CONFIG_GET, state, || get(config_handler::get_config)),
        )
        .route(
            "/auth/state",
            overrides.resolve(registry::AUTH_STATE, state, || get(auth::issue_state)),
        )
        .route(
            "/auth/callback",
            overrides.resolve(registry::AUTH_CALLBACK, state, || post(auth::callback)),
        )
        .route_layer(from_fn_with_state(JSON_BODY_LIMIT, content_length_limit))
        .route_layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
}

/// Namespace-scoped routes served by the discovered GenAI service.
fn genai_routes(state: &Arc<AppState>, overrides: &HandlerRegistry) -> ApiRouter {
    let json = Router::new()
        .route(
            "/models",
            overrides.resolve(registry::MODELS_LIST, state, || get(models::list_models)),
        )
        .route(
            "/vectorstores",
            overrides.resolve(registry::VECTOR_STORES_LIST, state, || {
                get(vectorstores::list_vector_stores)
            }),
        )
        .route(
            "/vectorstores",
            overrides.resolve(registry::VECTOR_STORES_CREATE, state, || {
                post(vectorstores::create_vector_store)
            }),
        )
        .route(
            "/vectorstores/:id",
            overrides.resolve(registry::VECTOR_STORES_DELETE, state, || {
                delete(vectorstores::delete_vector_store)
            }),
        )
        .route(
            "/vectorstores/:id/files",
            overrides.resolve(registry::VECTOR_STORE_FILES_LIST, state, || {
                get(vectorstores::list_vector_store_files)
            }),
        )
        .route(
            "/vectorstores/:id/files/:file_id",
            overrides.resolve(registry::VECTOR_STORE_FILES_DELETE, state, || {
                delete(vectorstores::delete_vector_store_file)
            }),
        )
        .route(
            "/files",
            overrides.resolve(registry::FILES_LIST, state, || get(files::list_files)),
        )
        .route(
            "/files/:id",
            overrides.resolve(registry::FILES_DELETE, state, || delete(files::delete_file)),
        )
        .route(
            "/responses",
            overrides.resolve(registry::RESPONSES_CREATE, state, || {
                post(responses::create_response)
            }),
        )
        .route(
            "/responses/:id",
            overrides.resolve(registry::RESPONSES_GET, state, || get(responses::get_response)),
        )
        .route_layer(from_fn_with_state(JSON_BODY_LIMIT, content_length_limit))
        .route_layer(DefaultBodyLimit::max(JSON_BODY_LIMIT));

    // Загрузка файла: тело не ограничивается, файл идёт потоком
    let upload = Router::new()
        .route(
            "/files/upload",
            overrides.resolve(registry::FILES_UPLOAD, state, || {
                post(files::upload_file).layer(DefaultBodyLimit::disable())
            }),
        )
        .route(
            "/vectorstores/:id/files",
            overrides.resolve(registry::VECTOR_STORE_FILES_UPLOAD, state, || {
                post(files::upload_to_vector_store).layer(DefaultBodyLimit::disable())
            }),
        );

    let gate = Gate::new(state.clone(), AccessRule::genai(&state.discovery_kind));
    json.merge(upload)
        .route_layer(from_fn_with_state(state.clone(), attach_genai))
        .route_layer(from_fn_with_state(gate, authorize))
        .route_layer(from_fn(require_namespace))
        .route_layer(from_fn_with_state(state.clone(), attach_identity))
}

/// Routes answered from the cluster with the caller's own credentials.
fn kubernetes_routes(state: &Arc<AppState>, overrides: &HandlerRegistry) -> ApiRouter {
    let namespace_routes = Router::new()
        .route(
            "/namespaces",
            overrides.resolve(registry::NAMESPACES_LIST, state, || {
                get(namespaces::list_namespaces)
            }),
        )
        .route(
            "/user",
            overrides.resolve(registry::USER_GET, state, || get(user::get_current_user)),
        );

    // Статус дистрибутива: те же права, что и у GenAI маршрутов, но без обнаружения сервиса
    let distribution_routes = Router::new()
        .route(
            "/llamastack-distribution/status",
            overrides.resolve(registry::DISTRIBUTION_STATUS, state, || {
                get(distribution::get_distribution_status)
            }),
        )
        .route_layer(from_fn_with_state(state.clone(), attach_kubernetes))
        .route_layer(from_fn_with_state(
            Gate::new(state.clone(), AccessRule::genai(&state.discovery_kind)),
            authorize,
        ))
        .route_layer(from_fn(require_namespace));

    let secret_routes = Router::new()
        .route(
            "/secrets",
            overrides.resolve(registry::SECRETS_LIST, state, || get(secrets::list_secrets)),
        )
        .route_layer(from_fn_with_state(state.clone(), attach_kubernetes))
        .route_layer(from_fn_with_state(
            Gate::new(state.clone(), AccessRule::list_secrets()),
            authorize,
        ))
        .route_layer(from_fn(require_resource_namespace));

    let object_store = Router::new()
        .route(
            "/s3/file",
            overrides.resolve(registry::S3_FILE_GET, state, || get(s3::get_file)),
        )
        .route_layer(from_fn_with_state(state.clone(), attach_kubernetes))
        .route_layer(from_fn_with_state(
            Gate::new(state.clone(), AccessRule::get_secrets()),
            authorize,
        ))
        .route_layer(from_fn(require_namespace));

    namespace_routes
        .route_layer(from_fn_with_state(state.clone(), attach_kubernetes))
        .merge(secret_routes)
        .merge(object_store)
        .merge(distribution_routes)
        .route_layer(from_fn_with_state(state.clone(), attach_identity))
}

async fn not_found() -> AppError {
    AppError::NotFound("the requested resource could not be found".into())
}

/// Middleware для добавления Request ID и трассировки запросов.
async fn trace_requests(mut req: AxumRequest<Body>, next: axum::middleware::Next) -> impl IntoResponse {
    let request_id = Uuid::new_v4();
    let start_time = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    // namespace заполняется позже, middleware пространства имён
    let span = info_span!(
        "request",
        request_id = %request_id,
        http.method = %method,
        url.path = %path,
        namespace = tracing::field::Empty,
    );

    req.extensions_mut().insert(request_id);

    async move {
        let mut response = next.run(req).await;
        let elapsed = start_time.elapsed();

        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        info!(
            http.response.duration = ?elapsed,
            http.status_code = response.status().as_u16(),
            "Finished processing request"
        );

        response
    }
    .instrument(span)
    .await
}

/// Builds the state and router for `config`, binds the port and serves
/// until `shutdown` resolves.
pub async fn run<F>(config: AppConfig, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let port = config.server.port;
    let prefix = config.api_prefix().to_string();
    let state = Arc::new(AppState::new(config).map_err(|e| {
        error!(error = ?e, "Failed to initialize application state. Exiting.");
        e
    })?);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!(server.address = %addr, error = ?e, "Failed to bind to address. Exiting.");
        AppError::from(e)
    })?;
    info!(server.address = %addr, api.prefix = %prefix, "Server listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| {
            error!(error = ?e, "Server run loop encountered an error. Exiting.");
            AppError::from(e)
        })?;

    info!("Server shut down gracefully.");
    Ok(())
}
