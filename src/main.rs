//! cgi-gateway
//!
//! Serves a directory tree, or translates HTTP requests into FastCGI
//! requests for an application backend such as php-fpm.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────┐
//!                       │                  GATEWAY                     │
//!     Client Request    │  ┌──────────┐   ┌──────────┐                 │
//!     ──────────────────┼─▶│   net    │──▶│  http    │──┬─▶ ServeDir   │
//!                       │  │ http/tls │   │  server  │  │   (static)   │
//!                       │  └──────────┘   └──────────┘  │              │
//!                       │                               ▼              │
//!                       │  ┌──────────┐   ┌──────────┐  ┌──────────┐   │
//!     Client Response   │  │ response │◀──│ fastcgi  │◀─│ request  │   │
//!     ◀─────────────────┼──│translate │   │  client  │  │   env    │   │
//!                       │  └──────────┘   └────┬─────┘  └──────────┘   │
//!                       └──────────────────────┼───────────────────────┘
//!                                              ▼
//!                                     FastCGI application
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use cgi_gateway::config::{cli, CliArgs, ConfigError, GatewayConfig, ServingMode};
use cgi_gateway::lifecycle::{signals, startup, Shutdown};
use cgi_gateway::observability::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let settings = CliArgs::parse().into_settings();

    logging::init(
        settings
            .as_ref()
            .map(|s| s.log_level.as_str())
            .unwrap_or("info"),
    );

    let config = match settings.and_then(|settings| cli::resolve(&settings)) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            report_config_error(&e);
            return ExitCode::FAILURE;
        }
    };

    log_banner(&config);

    let shutdown = Shutdown::new();
    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    match startup::run(config, &shutdown).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Listener failed");
            ExitCode::FAILURE
        }
    }
}

fn report_config_error(error: &ConfigError) {
    match error {
        ConfigError::Validation(errors) => {
            for e in errors {
                tracing::error!(error = %e, "Invalid configuration");
            }
        }
        other => tracing::error!(error = %other, "Unable to load configuration"),
    }
}

fn log_banner(config: &GatewayConfig) {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        http = %config.http,
        https = ?config.https.as_ref().map(|tls| tls.address.to_string()),
        "cgi-gateway starting"
    );

    match &config.mode {
        ServingMode::Static { root } => {
            tracing::info!(root = %root.display(), "Serving static files");
        }
        ServingMode::Proxy {
            backend,
            controller,
        } => {
            tracing::info!(
                backend = %backend,
                controller = %controller.display(),
                query_string = ?config.query_string,
                dial_timeout = ?config.timeouts.dial,
                backend_timeout = ?config.timeouts.backend,
                "Proxying to FastCGI backend"
            );
        }
    }
}
