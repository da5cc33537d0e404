//! Plain and TLS listeners.
//!
//! # Responsibilities
//! - Bind the configured addresses
//! - Serve a router with peer addresses attached to each request
//! - Stop accepting and drain in-flight requests on shutdown

use std::io;
use std::net::SocketAddr;

use axum::Router;
use axum_server::Handle;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinError;

use crate::config::{ListenAddress, TlsListenerConfig};
use crate::net::tls::load_tls_config;

/// A listener that could not start or stopped abnormally.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to resolve listen address {0}")]
    Resolve(String),

    #[error("failed to load TLS certificate or key: {0}")]
    Tls(#[source] io::Error),

    #[error("{listener} listener failed: {source}")]
    Serve {
        listener: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("listener task panicked: {0}")]
    Panicked(#[from] JoinError),
}

/// Bind and serve plain HTTP on `address` until shutdown.
pub async fn serve_plain(
    address: ListenAddress,
    router: Router,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), ListenerError> {
    let listener = TcpListener::bind(address.as_str())
        .await
        .map_err(|source| ListenerError::Bind {
            address: address.to_string(),
            source,
        })?;
    serve(listener, router, shutdown).await
}

/// Serve plain HTTP on an already bound listener until shutdown.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), ListenerError> {
    let local_addr = listener.local_addr().map_err(|source| ListenerError::Serve {
        listener: "http",
        source,
    })?;
    tracing::info!(address = %local_addr, "HTTP listener started");

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
        .map_err(|source| ListenerError::Serve {
            listener: "http",
            source,
        })?;

    tracing::info!(address = %local_addr, "HTTP listener stopped");
    Ok(())
}

/// Load the certificate, bind and serve HTTPS until shutdown.
pub async fn serve_tls(
    tls: TlsListenerConfig,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), ListenerError> {
    let rustls = load_tls_config(&tls.cert, &tls.key)
        .await
        .map_err(ListenerError::Tls)?;
    let address = resolve(&tls.address).await?;

    let handle = Handle::new();
    let drain = handle.clone();
    let watcher = tokio::spawn(async move {
        let _ = shutdown.recv().await;
        drain.graceful_shutdown(None);
    });

    tracing::info!(address = %address, cert = %tls.cert.display(), "HTTPS listener started");

    let served = axum_server::bind_rustls(address, rustls)
        .handle(handle)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await;
    watcher.abort();

    served.map_err(|source| ListenerError::Serve {
        listener: "https",
        source,
    })?;

    tracing::info!(address = %address, "HTTPS listener stopped");
    Ok(())
}

async fn resolve(address: &ListenAddress) -> Result<SocketAddr, ListenerError> {
    tokio::net::lookup_host(address.as_str())
        .await
        .ok()
        .and_then(|mut candidates| candidates.next())
        .ok_or_else(|| ListenerError::Resolve(address.to_string()))
}
