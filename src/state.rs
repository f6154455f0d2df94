// src/state.rs

use crate::clients::kubernetes::ResourceKind;
use crate::clients::ClientFactory;
use crate::config::AppConfig;
use crate::error::Result;
use crate::oauth::{StateRegistry, TokenExchanger};
use tracing::info;

/// Shared application state, handed to every handler as `State<Arc<AppState>>`.
///
/// The OAuth state registry is the only mutable part.
pub struct AppState {
    pub config: AppConfig,
    pub clients: ClientFactory,
    pub oauth_states: StateRegistry,
    pub token_exchanger: Option<TokenExchanger>,
    pub discovery_kind: ResourceKind,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("clients", &self.clients)
            .field("oauth_enabled", &self.token_exchanger.is_some())
            .field("discovery_kind", &self.discovery_kind)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Builds the shared transport and the client factory from `config`.
    pub fn new(config: AppConfig) -> Result<Self> {
        let clients = ClientFactory::from_config(&config)?;
        Ok(Self::with_clients(config, clients))
    }

    /// Uses a prepared factory, e.g. one bound to a custom mock cluster.
    pub fn with_clients(config: AppConfig, clients: ClientFactory) -> Self {
        let token_exchanger = config
            .oauth
            .enabled
            .then(|| TokenExchanger::new(clients.http().clone(), &config.oauth));
        let discovery_kind = ResourceKind::from(&config.kubernetes.discovery);
        info!(
            auth.method = ?config.auth.method,
            oauth.enabled = config.oauth.enabled,
            upstream.mock_ls = config.upstream.mock_ls_client,
            upstream.mock_k8s = config.upstream.mock_k8s_client,
            upstream.llama_stack_url = ?config.upstream.llama_stack_url,
            "Application state initialized"
        );
        Self {
            config,
            clients,
            oauth_states: StateRegistry::new(),
            token_exchanger,
            discovery_kind,
        }
    }
}
