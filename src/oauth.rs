// src/oauth.rs

//! OAuth authorization-code support: CSRF state tokens and the code exchange.

use crate::config::OAuthConfig;
use crate::error::{AppError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use parking_lot::Mutex;
use rand::{thread_rng, RngCore};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Lifetime of an issued state token.
pub const STATE_TTL: Duration = Duration::from_secs(10 * 60);
const STATE_BYTES: usize = 32;

/// Process-local map of outstanding state tokens to their expiry.
///
/// Lost on restart; callers simply start the flow again.
#[derive(Debug)]
pub struct StateRegistry {
    states: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl Default for StateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::with_ttl(STATE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Issues a fresh state and sweeps expired ones.
    pub fn issue(&self) -> String {
        self.issue_at(Instant::now())
    }

    fn issue_at(&self, now: Instant) -> String {
        let mut bytes = [0u8; STATE_BYTES];
        thread_rng().fill_bytes(&mut bytes);
        let state = URL_SAFE_NO_PAD.encode(bytes);

        let mut states = self.states.lock();
        states.insert(state.clone(), now + self.ttl);
        let before = states.len();
        states.retain(|_, expiry| *expiry > now);
        let swept = before - states.len();
        if swept > 0 {
            debug!(swept, "Swept expired OAuth states");
        }
        state
    }

    /// True exactly once for an issued, unexpired state. The entry is removed either way.
    pub fn validate(&self, state: &str) -> bool {
        self.validate_at(state, Instant::now())
    }

    fn validate_at(&self, state: &str, now: Instant) -> bool {
        match self.states.lock().remove(state) {
            Some(expiry) => expiry > now,
            None => false,
        }
    }

    /// Drops every expired entry.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.states.lock().retain(|_, expiry| *expiry > now);
    }

    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Body accepted by the callback endpoint.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallbackRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub state: String,
}

/// Exchanges authorization codes at `{server_url}/oauth/token`.
pub struct TokenExchanger {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: Secret<String>,
    redirect_uri: String,
    timeout: Duration,
}

impl TokenExchanger {
    pub fn new(http: Client, config: &OAuthConfig) -> Self {
        Self {
            http,
            token_url: format!("{}/oauth/token", config.server_url.trim_end_matches('/')),
            client_id: config.client_id.clone(),
            client_secret: Secret::new(config.client_secret.clone()),
            redirect_uri: config.redirect_uri.clone(),
            timeout: Duration::from_secs(config.token_timeout_secs),
        }
    }

    /// Returns the token endpoint's JSON verbatim. The timeout applies even if
    /// the caller's request is still alive.
    pub async fn exchange(&self, code: &str) -> Result<Value> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret().as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        let response = self
            .http
            .post(&self.token_url)
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, url = %self.token_url, "OAuth token request failed");
                AppError::AuthenticationFailed(e.to_string())
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "OAuth token endpoint rejected the code");
            return Err(AppError::AuthenticationFailed(format!(
                "token endpoint returned {status}"
            )));
        }

        let token = response.json::<Value>().await.map_err(|e| {
            error!(error = %e, "OAuth token response is not JSON");
            AppError::AuthenticationFailed(e.to_string())
        })?;
        info!("OAuth code exchanged for token");
        Ok(token)
    }
}
