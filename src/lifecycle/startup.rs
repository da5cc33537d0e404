//! Serving supervisor.
//!
//! # Responsibilities
//! - Start the plain listener, and the TLS listener when configured
//! - Run them concurrently, each on its own task
//! - End on the first listener failure, or when all listeners have drained
//!
//! # Design Decisions
//! - Fail fast: the first listener error stops the whole process
//! - Remaining listeners are aborted when the supervisor returns an error

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::config::{GatewayConfig, ServingMode};
use crate::http::GatewayServer;
use crate::lifecycle::Shutdown;
use crate::net::listener::{self, ListenerError};

/// Serve `config` until shutdown or the first listener failure.
pub async fn run(config: Arc<GatewayConfig>, shutdown: &Shutdown) -> Result<(), ListenerError> {
    let server = GatewayServer::new(&config);
    let mut listeners = JoinSet::new();

    listeners.spawn(listener::serve_plain(
        config.http.clone(),
        server.router(false),
        shutdown.subscribe(),
    ));

    if let Some(tls) = &config.https {
        listeners.spawn(listener::serve_tls(
            tls.clone(),
            server.router(true),
            shutdown.subscribe(),
        ));
    }

    tracing::info!(
        listeners = listeners.len(),
        mode = mode_name(&config.mode),
        "Gateway serving"
    );

    while let Some(joined) = listeners.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(e) => return Err(ListenerError::Panicked(e)),
        }
    }

    Ok(())
}

fn mode_name(mode: &ServingMode) -> &'static str {
    match mode {
        ServingMode::Static { .. } => "static",
        ServingMode::Proxy { .. } => "proxy",
    }
}
