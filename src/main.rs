// src/main.rs

use genai_bff::cli::{Cli, Commands};
use genai_bff::config::load_config;
use genai_bff::{run, AppError};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!(signal = "Ctrl+C", "Received signal. Initiating graceful shutdown...") },
        () = terminate => { info!(signal = "Terminate", "Received signal. Initiating graceful shutdown...") },
    }
}

fn initial_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL")
            .ok()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| "info".to_string());
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

async fn serve(cli: Cli) -> Result<(), AppError> {
    // --- Initialize Tracing (JSON format) ---
    let (filter, filter_handle) = reload::Layer::new(initial_filter());
    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true);
    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .init();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = load_config(&config_path, |c| cli.apply(c)).map_err(|e| {
        error!(config.path = %config_path.display(), error = %e, "Failed to load or validate configuration. Exiting.");
        e
    })?;

    // RUST_LOG важнее log_level из файла
    if std::env::var_os("RUST_LOG").is_none() {
        match EnvFilter::try_new(&config.log_level) {
            Ok(level) => {
                if let Err(e) = filter_handle.modify(|f| *f = level) {
                    warn!(error = %e, "Failed to apply configured log level");
                }
            }
            Err(e) => warn!(log_level = %config.log_level, error = %e, "Ignoring invalid log level"),
        }
    }

    if cli.command == Some(Commands::CheckConfig) {
        info!(config.path = %config_path.display(), "Configuration is valid");
        return Ok(());
    }

    info!(
        server.port = config.server.port,
        api.prefix = %config.api_prefix(),
        auth.method = ?config.auth.method,
        "Starting GenAI BFF..."
    );
    run(config, shutdown_signal()).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    match serve(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("genai-bff: {e}");
            ExitCode::FAILURE
        }
    }
}
