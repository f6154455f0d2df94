use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(
    name = "genai-bff",
    version,
    about = "Backend-for-frontend for the GenAI console",
    long_about = "Serves the browser console's JSON API: authorizes each request against the Kubernetes cluster, discovers the namespace's GenAI service and relays model, vector store, file and response calls to it."
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "BFF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// API path prefix, e.g. /api/v1
    #[arg(long)]
    pub api_path_prefix: Option<String>,

    /// Serve GenAI routes from fixtures
    #[arg(long)]
    pub mock_ls_client: bool,

    /// Serve Kubernetes calls from fixtures
    #[arg(long)]
    pub mock_k8s_client: bool,

    /// Fixed GenAI service URL (skips discovery)
    #[arg(long)]
    pub llama_stack_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the server (default)
    Serve,

    /// Load and validate the configuration, then exit
    CheckConfig,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Flags win over file and environment values. Boolean flags only ever switch mocks on.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(prefix) = &self.api_path_prefix {
            config.server.api_path_prefix = prefix.clone();
        }
        if self.mock_ls_client {
            config.upstream.mock_ls_client = true;
        }
        if self.mock_k8s_client {
            config.upstream.mock_k8s_client = true;
        }
        if let Some(url) = &self.llama_stack_url {
            config.upstream.llama_stack_url = Some(url.clone());
        }
    }
}
