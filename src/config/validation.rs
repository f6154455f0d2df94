// src/config/validation.rs

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use tracing::{debug, warn};
use url::Url;

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &AppConfig) -> Result<()> {
        debug!("Starting configuration validation");

        if let Err(e) = Self::validate_server_config(config) {
            warn!("Server config validation failed: {}", e);
            return Err(e);
        }
        debug!("Server config validation passed");

        if let Err(e) = Self::validate_oauth_config(config) {
            warn!("OAuth config validation failed: {}", e);
            return Err(e);
        }
        debug!("OAuth config validation passed");

        if let Err(e) = Self::validate_upstream_config(config) {
            warn!("Upstream config validation failed: {}", e);
            return Err(e);
        }
        debug!("Upstream config validation passed");

        debug!("Configuration validation completed successfully");
        Ok(())
    }

    fn validate_server_config(config: &AppConfig) -> Result<()> {
        // Allow port 0 in test mode (system will assign a free port)
        if config.server.port == 0 && !config.server.test_mode {
            return Err(AppError::config_validation(
                "Server port cannot be 0 (except in test mode)",
                Some("server.port"),
            ));
        }

        let prefix = &config.server.api_path_prefix;
        if !prefix.starts_with('/') || prefix.trim_end_matches('/').is_empty() {
            return Err(AppError::config_validation(
                format!("API path prefix must start with '/' and not be the root: {prefix}"),
                Some("server.api_path_prefix"),
            ));
        }

        if config.server.connect_timeout_secs == 0 {
            return Err(AppError::config_validation(
                "Connect timeout cannot be 0",
                Some("server.connect_timeout_secs"),
            ));
        }

        if config.server.request_timeout_secs == 0 {
            return Err(AppError::config_validation(
                "Request timeout cannot be 0",
                Some("server.request_timeout_secs"),
            ));
        }

        for origin in &config.server.allowed_origins {
            if origin != "*" {
                Self::validate_url(origin, "server.allowed_origins")?;
            }
        }

        Ok(())
    }

    fn validate_oauth_config(config: &AppConfig) -> Result<()> {
        let oauth = &config.oauth;
        if !oauth.enabled {
            return Ok(());
        }

        let required = [
            ("oauth.server_url", &oauth.server_url),
            ("oauth.client_id", &oauth.client_id),
            ("oauth.client_secret", &oauth.client_secret),
            ("oauth.redirect_uri", &oauth.redirect_uri),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::config_validation(
                    format!("{field} is required when OAuth is enabled"),
                    Some(field),
                ));
            }
        }

        Self::validate_url(&oauth.server_url, "oauth.server_url")?;
        Self::validate_url(&oauth.redirect_uri, "oauth.redirect_uri")?;

        if oauth.token_timeout_secs == 0 {
            return Err(AppError::config_validation(
                "OAuth token timeout cannot be 0",
                Some("oauth.token_timeout_secs"),
            ));
        }
        Ok(())
    }

    fn validate_upstream_config(config: &AppConfig) -> Result<()> {
        if let Some(url) = &config.upstream.llama_stack_url {
            Self::validate_url(url, "upstream.llama_stack_url")?;
        }
        if let Some(url) = &config.kubernetes.api_url {
            Self::validate_url(url, "kubernetes.api_url")?;
        }
        let discovery = &config.kubernetes.discovery;
        if discovery.plural.is_empty() || discovery.version.is_empty() {
            return Err(AppError::config_validation(
                "Discovery resource needs a version and a plural name",
                Some("kubernetes.discovery"),
            ));
        }
        Ok(())
    }

    fn validate_url(url_str: &str, field_name: &str) -> Result<()> {
        let url = Url::parse(url_str).map_err(|e| {
            AppError::config_validation(
                format!("Invalid URL in {field_name}: {url_str} - {e}"),
                Some(field_name),
            )
        })?;

        match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(AppError::config_validation(
                format!("Unsupported scheme '{scheme}' in {field_name}. Supported: http, https"),
                Some(field_name),
            )),
        }
    }
}
