// src/clients/mod.rs

//! Outbound clients and the per-request factory that binds them to a caller.

pub mod genai;
pub mod genai_mock;
pub mod kubernetes;
pub mod kubernetes_mock;
pub mod s3;

pub use genai::{ByteStream, GenAiClient, OpenAiCompatibleClient};
pub use genai_mock::MockGenAiClient;
pub use kubernetes::{KubernetesClient, RestKubernetesClient};
pub use kubernetes_mock::{MockCluster, MockKubernetesClient};
pub use s3::{ObjectStore, S3Client, S3Credentials};

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::identity::RequestIdentity;
use reqwest::{Certificate, Client};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Reads every PEM bundle in `paths`. Unreadable or malformed files are skipped.
pub fn load_root_certificates<P: AsRef<Path>>(paths: &[P]) -> Vec<Certificate> {
    let mut certificates = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let pem = match std::fs::read(path) {
            Ok(pem) => pem,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable CA bundle");
                continue;
            }
        };
        match Certificate::from_pem_bundle(&pem) {
            Ok(found) => {
                info!(path = %path.display(), count = found.len(), "Loaded CA bundle");
                certificates.extend(found);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping malformed CA bundle"),
        }
    }
    certificates
}

/// Apiserver base URL: explicit config first, then the in-cluster service environment.
pub fn resolve_apiserver_url(configured: Option<&str>) -> Result<Option<Url>> {
    if let Some(raw) = configured.filter(|s| !s.trim().is_empty()) {
        let url = Url::parse(raw)
            .map_err(|e| AppError::config_validation(e.to_string(), Some("kubernetes.api_url")))?;
        return Ok(Some(url));
    }
    let host = std::env::var("KUBERNETES_SERVICE_HOST").ok();
    let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
    match host {
        Some(host) if !host.is_empty() => {
            let host = if host.contains(':') {
                format!("[{host}]")
            } else {
                host
            };
            Url::parse(&format!("https://{host}:{port}"))
                .map(Some)
                .map_err(|e| AppError::Config(format!("invalid in-cluster apiserver address: {e}")))
        }
        _ => Ok(None),
    }
}

/// Builds the shared outbound HTTP client.
pub fn build_http_client(config: &AppConfig) -> Result<Client> {
    let mut bundles: Vec<PathBuf> = config.upstream.bundle_paths.clone();
    if config.kubernetes.ca_path.exists() {
        bundles.push(config.kubernetes.ca_path.clone());
    }

    let mut builder = Client::builder()
        .connect_timeout(Duration::from_secs(config.server.connect_timeout_secs))
        .timeout(Duration::from_secs(config.server.request_timeout_secs))
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Some(Duration::from_secs(60)));
    for certificate in load_root_certificates(&bundles) {
        builder = builder.add_root_certificate(certificate);
    }
    builder
        .build()
        .map_err(|e| AppError::HttpClientBuild(e.to_string()))
}

/// Hands out clients bound to the identity of the current request.
pub struct ClientFactory {
    http: Client,
    apiserver: Option<Url>,
    service_account_token_path: PathBuf,
    genai_api_prefix: String,
    mock_cluster: Option<Arc<MockCluster>>,
    mock_genai: bool,
}

impl std::fmt::Debug for ClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientFactory")
            .field("apiserver", &self.apiserver.as_ref().map(Url::as_str))
            .field("mock_k8s", &self.mock_cluster.is_some())
            .field("mock_genai", &self.mock_genai)
            .finish()
    }
}

impl ClientFactory {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let http = build_http_client(config)?;
        let mock_cluster = config
            .upstream
            .mock_k8s_client
            .then(|| Arc::new(MockCluster::fixture()));
        let apiserver = if mock_cluster.is_some() {
            None
        } else {
            resolve_apiserver_url(config.kubernetes.api_url.as_deref())?
        };
        if mock_cluster.is_none() && apiserver.is_none() {
            warn!("No Kubernetes apiserver configured; Kubernetes-backed routes will fail");
        }
        Ok(Self {
            http,
            apiserver,
            service_account_token_path: config.kubernetes.token_path.clone(),
            genai_api_prefix: config.upstream.genai_api_prefix.clone(),
            mock_cluster,
            mock_genai: config.upstream.mock_ls_client,
        })
    }

    /// Replaces the in-memory cluster, switching Kubernetes calls to mock mode.
    pub fn with_mock_cluster(mut self, cluster: MockCluster) -> Self {
        self.mock_cluster = Some(Arc::new(cluster));
        self
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn is_mock_genai(&self) -> bool {
        self.mock_genai
    }

    async fn service_account_token(&self) -> Result<String> {
        let token = tokio::fs::read_to_string(&self.service_account_token_path)
            .await
            .map_err(|e| {
                AppError::Config(format!(
                    "cannot read service account token {}: {e}",
                    self.service_account_token_path.display()
                ))
            })?;
        Ok(token.trim().to_string())
    }

    /// Kubernetes client acting as the caller. Callers without a bearer token
    /// (trusted headers, or auth disabled) use the service account.
    pub async fn kubernetes(&self, identity: &RequestIdentity) -> Result<Arc<dyn KubernetesClient>> {
        if let Some(cluster) = &self.mock_cluster {
            return Ok(Arc::new(MockKubernetesClient::new(cluster.clone(), identity)));
        }
        let base_url = self
            .apiserver
            .clone()
            .ok_or_else(|| AppError::Config("kubernetes apiserver URL is not configured".into()))?;
        let token = match &identity.token {
            Some(token) => token.clone(),
            None => self.service_account_token().await?,
        };
        Ok(Arc::new(RestKubernetesClient::new(self.http.clone(), base_url, token)))
    }

    /// GenAI client for `service_url`, forwarding the caller's bearer token.
    pub fn genai(&self, service_url: &str, identity: &RequestIdentity) -> Result<Arc<dyn GenAiClient>> {
        if self.mock_genai {
            return Ok(Arc::new(MockGenAiClient::new()));
        }
        let client = OpenAiCompatibleClient::new(
            self.http.clone(),
            service_url,
            &self.genai_api_prefix,
            identity.token.clone(),
        )?;
        Ok(Arc::new(client))
    }

    pub fn object_store(&self, credentials: S3Credentials) -> Arc<dyn ObjectStore> {
        Arc::new(S3Client::new(self.http.clone(), credentials))
    }
}
