// src/registry.rs

//! Stable handler ids and the override table consulted while the router is built.
//!
//! A downstream build registers overrides before calling `create_router`; each
//! override receives the default builder so it can wrap the stock handler.

use crate::state::AppState;
use axum::routing::MethodRouter;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub type Route = MethodRouter<Arc<AppState>>;

/// Builds the stock handler for an id.
pub type DefaultBuilder<'a> = &'a dyn Fn() -> Route;

pub type OverrideFactory =
    Arc<dyn for<'a> Fn(&Arc<AppState>, DefaultBuilder<'a>) -> Route + Send + Sync>;

pub const HEALTHCHECK: &str = "healthcheck";
pub const CONFIG_GET: &str = "config.get";
pub const AUTH_STATE: &str = "auth.state";
pub const AUTH_CALLBACK: &str = "auth.callback";
pub const MODELS_LIST: &str = "models.list";
pub const VECTOR_STORES_LIST: &str = "vectorstores.list";
pub const VECTOR_STORES_CREATE: &str = "vectorstores.create";
pub const VECTOR_STORES_DELETE: &str = "vectorstores.delete";
pub const VECTOR_STORE_FILES_LIST: &str = "vectorstores.files.list";
pub const VECTOR_STORE_FILES_UPLOAD: &str = "vectorstores.files.upload";
pub const VECTOR_STORE_FILES_DELETE: &str = "vectorstores.files.delete";
pub const FILES_UPLOAD: &str = "files.upload";
pub const FILES_LIST: &str = "files.list";
pub const FILES_DELETE: &str = "files.delete";
pub const RESPONSES_CREATE: &str = "responses.create";
pub const RESPONSES_GET: &str = "responses.get";
pub const NAMESPACES_LIST: &str = "namespaces.list";
pub const SECRETS_LIST: &str = "secrets.list";
pub const S3_FILE_GET: &str = "s3.file.get";
pub const USER_GET: &str = "user.get";
pub const DISTRIBUTION_STATUS: &str = "distribution.status";

/// Every id the router asks for.
pub const HANDLER_IDS: &[&str] = &[
    HEALTHCHECK,
    CONFIG_GET,
    AUTH_STATE,
    AUTH_CALLBACK,
    MODELS_LIST,
    VECTOR_STORES_LIST,
    VECTOR_STORES_CREATE,
    VECTOR_STORES_DELETE,
    VECTOR_STORE_FILES_LIST,
    VECTOR_STORE_FILES_UPLOAD,
    VECTOR_STORE_FILES_DELETE,
    FILES_UPLOAD,
    FILES_LIST,
    FILES_DELETE,
    RESPONSES_CREATE,
    RESPONSES_GET,
    NAMESPACES_LIST,
    SECRETS_LIST,
    S3_FILE_GET,
    USER_GET,
    DISTRIBUTION_STATUS,
];

/// Override table. Written during startup, read while routes are built.
#[derive(Default)]
pub struct HandlerRegistry {
    overrides: RwLock<HashMap<&'static str, OverrideFactory>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the handler for `id`. A later registration for the same id wins.
    pub fn register<F>(&self, id: &'static str, factory: F)
    where
        F: for<'a> Fn(&Arc<AppState>, DefaultBuilder<'a>) -> Route + Send + Sync + 'static,
    {
        info!(handler.id = id, "Registered handler override");
        self.overrides.write().insert(id, Arc::new(factory));
    }

    pub fn is_overridden(&self, id: &str) -> bool {
        self.overrides.read().contains_key(id)
    }

    /// The override for `id` if one is registered, otherwise `default()`.
    pub fn resolve(&self, id: &'static str, state: &Arc<AppState>, default: impl Fn() -> Route) -> Route {
        let factory = self.overrides.read().get(id).cloned();
        match factory {
            Some(factory) => factory(state, &default),
            None => default(),
        }
    }
}

static GLOBAL: Lazy<HandlerRegistry> = Lazy::new(HandlerRegistry::new);

/// Process-wide registry used by `create_router`.
pub fn global() -> &'static HandlerRegistry {
    &GLOBAL
}

/// Registers an override in the process-wide registry.
pub fn register_override<F>(id: &'static str, factory: F)
where
    F: for<'a> Fn(&Arc<AppState>, DefaultBuilder<'a>) -> Route + Send + Sync + 'static,
{
    global().register(id, factory);
}
