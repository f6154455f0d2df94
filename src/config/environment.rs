//! Environment-based configuration management

use super::app::{AppConfig, AuthMethod};
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};

/// Environment configuration that can override file-based config
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentConfig {
    pub port: Option<u16>,
    pub api_path_prefix: Option<String>,
    pub allowed_origins: Option<Vec<String>>,
    pub static_assets_dir: Option<PathBuf>,
    pub auth_method: Option<AuthMethod>,
    pub auth_token_header: Option<String>,
    pub user_id_header: Option<String>,
    pub groups_header: Option<String>,
    pub oauth_enabled: Option<bool>,
    pub oauth_server_url: Option<String>,
    pub oauth_client_id: Option<String>,
    pub oauth_client_secret: Option<String>,
    pub oauth_redirect_uri: Option<String>,
    pub oauth_token_timeout_secs: Option<u64>,
    pub mock_ls_client: Option<bool>,
    pub mock_k8s_client: Option<bool>,
    pub llama_stack_url: Option<String>,
    pub bundle_paths: Option<Vec<PathBuf>>,
    pub log_level: Option<String>,
    pub kubernetes_api_url: Option<String>,
    pub kubernetes_token_path: Option<PathBuf>,
    pub kubernetes_ca_path: Option<PathBuf>,
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = non_empty(name)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(env.var = name, env.value = %raw, "Ignoring unparsable environment variable");
            None
        }
    }
}

fn flag(name: &str) -> Option<bool> {
    let raw = non_empty(name)?;
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(env.var = name, env.value = %raw, "Ignoring non-boolean environment variable");
            None
        }
    }
}

fn list(name: &str) -> Option<Vec<String>> {
    non_empty(name).map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

impl EnvironmentConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: parsed("PORT"),
            api_path_prefix: non_empty("API_PATH_PREFIX"),
            allowed_origins: list("ALLOWED_ORIGINS"),
            static_assets_dir: non_empty("STATIC_ASSETS_DIR").map(PathBuf::from),
            auth_method: non_empty("AUTH_METHOD").and_then(|v| {
                let method = AuthMethod::parse(&v);
                if method.is_none() {
                    warn!(env.value = %v, "Unknown AUTH_METHOD, keeping configured value");
                }
                method
            }),
            auth_token_header: non_empty("AUTH_TOKEN_HEADER"),
            user_id_header: non_empty("USER_ID_HEADER"),
            groups_header: non_empty("GROUPS_HEADER"),
            oauth_enabled: flag("OAUTH_ENABLED"),
            oauth_server_url: non_empty("OAUTH_SERVER_URL"),
            oauth_client_id: non_empty("OAUTH_CLIENT_ID"),
            oauth_client_secret: non_empty("OAUTH_CLIENT_SECRET"),
            oauth_redirect_uri: non_empty("OAUTH_REDIRECT_URI"),
            oauth_token_timeout_secs: parsed("OAUTH_TOKEN_TIMEOUT_SECS"),
            mock_ls_client: flag("MOCK_LS_CLIENT"),
            mock_k8s_client: flag("MOCK_K8S_CLIENT"),
            llama_stack_url: non_empty("LLAMA_STACK_URL"),
            bundle_paths: list("BUNDLE_PATHS")
                .map(|paths| paths.into_iter().map(PathBuf::from).collect()),
            log_level: non_empty("LOG_LEVEL"),
            kubernetes_api_url: non_empty("KUBERNETES_API_URL"),
            kubernetes_token_path: non_empty("KUBERNETES_TOKEN_PATH").map(PathBuf::from),
            kubernetes_ca_path: non_empty("KUBERNETES_CA_PATH").map(PathBuf::from),
        }
    }

    /// Check if any environment overrides are present
    pub fn has_overrides(&self) -> bool {
        *self != Self::default()
    }

    /// Get a summary of active environment overrides. Secret values are never included.
    pub fn override_summary(&self) -> Vec<&'static str> {
        let mut overrides = Vec::new();
        let mut note = |present: bool, name: &'static str| {
            if present {
                overrides.push(name);
            }
        };
        note(self.port.is_some(), "PORT");
        note(self.api_path_prefix.is_some(), "API_PATH_PREFIX");
        note(self.allowed_origins.is_some(), "ALLOWED_ORIGINS");
        note(self.static_assets_dir.is_some(), "STATIC_ASSETS_DIR");
        note(self.auth_method.is_some(), "AUTH_METHOD");
        note(self.auth_token_header.is_some(), "AUTH_TOKEN_HEADER");
        note(self.user_id_header.is_some(), "USER_ID_HEADER");
        note(self.groups_header.is_some(), "GROUPS_HEADER");
        note(self.oauth_enabled.is_some(), "OAUTH_ENABLED");
        note(self.oauth_server_url.is_some(), "OAUTH_SERVER_URL");
        note(self.oauth_client_id.is_some(), "OAUTH_CLIENT_ID");
        note(self.oauth_client_secret.is_some(), "OAUTH_CLIENT_SECRET");
        note(self.oauth_redirect_uri.is_some(), "OAUTH_REDIRECT_URI");
        note(self.oauth_token_timeout_secs.is_some(), "OAUTH_TOKEN_TIMEOUT_SECS");
        note(self.mock_ls_client.is_some(), "MOCK_LS_CLIENT");
        note(self.mock_k8s_client.is_some(), "MOCK_K8S_CLIENT");
        note(self.llama_stack_url.is_some(), "LLAMA_STACK_URL");
        note(self.bundle_paths.is_some(), "BUNDLE_PATHS");
        note(self.log_level.is_some(), "LOG_LEVEL");
        note(self.kubernetes_api_url.is_some(), "KUBERNETES_API_URL");
        note(self.kubernetes_token_path.is_some(), "KUBERNETES_TOKEN_PATH");
        note(self.kubernetes_ca_path.is_some(), "KUBERNETES_CA_PATH");
        overrides
    }

    /// Applies every present override onto `config`.
    pub fn apply(self, config: &mut AppConfig) {
        if self.has_overrides() {
            info!(overrides = ?self.override_summary(), "Applying environment overrides");
        }
        let server = &mut config.server;
        if let Some(v) = self.port {
            server.port = v;
        }
        if let Some(v) = self.api_path_prefix {
            server.api_path_prefix = v;
        }
        if let Some(v) = self.allowed_origins {
            server.allowed_origins = v;
        }
        if let Some(v) = self.static_assets_dir {
            server.static_assets_dir = Some(v);
        }

        let auth = &mut config.auth;
        if let Some(v) = self.auth_method {
            auth.method = v;
        }
        if let Some(v) = self.auth_token_header {
            auth.token_header = v;
        }
        if let Some(v) = self.user_id_header {
            auth.user_id_header = v;
        }
        if let Some(v) = self.groups_header {
            auth.groups_header = v;
        }

        let oauth = &mut config.oauth;
        if let Some(v) = self.oauth_enabled {
            oauth.enabled = v;
        }
        if let Some(v) = self.oauth_server_url {
            oauth.server_url = v;
        }
        if let Some(v) = self.oauth_client_id {
            oauth.client_id = v;
        }
        if let Some(v) = self.oauth_client_secret {
            oauth.client_secret = v;
        }
        if let Some(v) = self.oauth_redirect_uri {
            oauth.redirect_uri = v;
        }
        if let Some(v) = self.oauth_token_timeout_secs {
            oauth.token_timeout_secs = v;
        }

        let upstream = &mut config.upstream;
        if let Some(v) = self.mock_ls_client {
            upstream.mock_ls_client = v;
        }
        if let Some(v) = self.mock_k8s_client {
            upstream.mock_k8s_client = v;
        }
        if let Some(v) = self.llama_stack_url {
            upstream.llama_stack_url = Some(v);
        }
        if let Some(v) = self.bundle_paths {
            upstream.bundle_paths = v;
        }

        if let Some(v) = self.log_level {
            config.log_level = v;
        }

        let kube = &mut config.kubernetes;
        if let Some(v) = self.kubernetes_api_url {
            kube.api_url = Some(v);
        }
        if let Some(v) = self.kubernetes_token_path {
            kube.token_path = v;
        }
        if let Some(v) = self.kubernetes_ca_path {
            kube.ca_path = v;
        }
    }
}
