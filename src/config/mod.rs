// src/config/mod.rs

pub mod app;
pub mod environment;
pub mod loader;
pub mod validation;

pub use app::{
    AppConfig, AuthConfig, AuthMethod, DiscoveryConfig, KubernetesConfig, OAuthConfig,
    ServerConfig, UpstreamConfig,
};
pub use environment::EnvironmentConfig;
pub use loader::load_config;
pub use validation::ConfigValidator;
