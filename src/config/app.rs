// src/config/app.rs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How the caller identity is established on API routes.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Bearer token (and optional trusted user/group headers) taken from each request.
    #[default]
    UserToken,
    /// No identity checks; every request runs as the anonymous identity.
    Disabled,
}

impl AuthMethod {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user_token" | "token" => Some(Self::UserToken),
            "disabled" | "none" => Some(Self::Disabled),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_api_path_prefix")]
    pub api_path_prefix: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub static_assets_dir: Option<PathBuf>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub test_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            api_path_prefix: default_api_path_prefix(),
            allowed_origins: Vec::new(),
            static_assets_dir: None,
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            test_mode: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub method: AuthMethod,
    #[serde(default = "default_token_header")]
    pub token_header: String,
    #[serde(default = "default_token_prefix")]
    pub token_prefix: String,
    #[serde(default = "default_user_id_header")]
    pub user_id_header: String,
    #[serde(default = "default_groups_header")]
    pub groups_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            method: AuthMethod::default(),
            token_header: default_token_header(),
            token_prefix: default_token_prefix(),
            user_id_header: default_user_id_header(),
            groups_header: default_groups_header(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub server_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default, skip_serializing)]
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uri: String,
    /// Hard timeout for the token exchange, independent of the caller's request.
    #[serde(default = "default_oauth_token_timeout")]
    pub token_timeout_secs: u64,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            token_timeout_secs: default_oauth_token_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct UpstreamConfig {
    /// Serve GenAI routes from built-in fixtures instead of a real service.
    #[serde(default)]
    pub mock_ls_client: bool,
    /// Serve Kubernetes calls from built-in fixtures instead of the apiserver.
    #[serde(default)]
    pub mock_k8s_client: bool,
    /// Fixed GenAI service URL; bypasses discovery when set.
    #[serde(default)]
    pub llama_stack_url: Option<String>,
    /// Path segment inserted between the service URL and OpenAI-compatible routes.
    #[serde(default = "default_genai_api_prefix")]
    pub genai_api_prefix: String,
    #[serde(default)]
    pub bundle_paths: Vec<PathBuf>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            mock_ls_client: false,
            mock_k8s_client: false,
            llama_stack_url: None,
            genai_api_prefix: default_genai_api_prefix(),
            bundle_paths: Vec::new(),
        }
    }
}

/// Custom resource kind whose status carries the GenAI service URL.
#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_discovery_group")]
    pub group: String,
    #[serde(default = "default_discovery_version")]
    pub version: String,
    #[serde(default = "default_discovery_plural")]
    pub plural: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            group: default_discovery_group(),
            version: default_discovery_version(),
            plural: default_discovery_plural(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct KubernetesConfig {
    /// Apiserver base URL. Falls back to the in-cluster service environment.
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_sa_token_path")]
    pub token_path: PathBuf,
    #[serde(default = "default_sa_ca_path")]
    pub ca_path: PathBuf,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            token_path: default_sa_token_path(),
            ca_path: default_sa_ca_path(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub kubernetes: KubernetesConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            oauth: OAuthConfig::default(),
            upstream: UpstreamConfig::default(),
            kubernetes: KubernetesConfig::default(),
            log_level: default_log_level(),
        }
    }
}

// Default value functions
fn default_port() -> u16 {
    8080
}

fn default_api_path_prefix() -> String {
    "/api/v1".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    300
}

fn default_token_header() -> String {
    "Authorization".to_string()
}

fn default_token_prefix() -> String {
    "Bearer ".to_string()
}

fn default_user_id_header() -> String {
    "kubeflow-userid".to_string()
}

fn default_groups_header() -> String {
    "kubeflow-groups".to_string()
}

fn default_oauth_token_timeout() -> u64 {
    15
}

fn default_genai_api_prefix() -> String {
    "/v1".to_string()
}

fn default_discovery_group() -> String {
    "llamastack.io".to_string()
}

fn default_discovery_version() -> String {
    "v1alpha1".to_string()
}

fn default_discovery_plural() -> String {
    "llamastackdistributions".to_string()
}

fn default_sa_token_path() -> PathBuf {
    PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/token")
}

fn default_sa_ca_path() -> PathBuf {
    PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/ca.crt")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    pub fn auth_disabled(&self) -> bool {
        self.auth.method == AuthMethod::Disabled
    }

    /// API prefix without a trailing slash, e.g. `/api/v1`.
    pub fn api_prefix(&self) -> &str {
        self.server.api_path_prefix.trim_end_matches('/')
    }
}
