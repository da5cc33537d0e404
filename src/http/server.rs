//! HTTP server setup.
//!
//! # Responsibilities
//! - Build one Axum router per listener (plain or TLS)
//! - Dispatch every request to the configured upstream: the static file
//!   tree or the FastCGI gateway
//! - Wire up middleware (request tracing, panic isolation)

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tower::ServiceExt;
use tower_http::{catch_panic::CatchPanicLayer, services::ServeDir, trace::TraceLayer};

use crate::config::{GatewayConfig, ServingMode};
use crate::http::gateway::Gateway;
use crate::http::request::EnvironmentContext;

/// Where requests are served from, fixed at startup.
#[derive(Clone)]
enum Upstream {
    Static(ServeDir),
    Gateway(Arc<Gateway>),
}

/// Router state for one listener.
#[derive(Clone)]
struct ListenerState {
    upstream: Upstream,
    secure: bool,
}

/// Builds the routers the listeners serve.
pub struct GatewayServer {
    upstream: Upstream,
}

impl GatewayServer {
    pub fn new(config: &GatewayConfig) -> Self {
        let upstream = match &config.mode {
            ServingMode::Static { root } => Upstream::Static(ServeDir::new(root)),
            ServingMode::Proxy {
                backend,
                controller,
            } => {
                let context = EnvironmentContext::new(config, backend, controller);
                Upstream::Gateway(Arc::new(Gateway::new(context, config.timeouts)))
            }
        };
        Self { upstream }
    }

    /// Router for a listener; `secure` marks the TLS listener.
    pub fn router(&self, secure: bool) -> Router {
        let state = ListenerState {
            upstream: self.upstream.clone(),
            secure,
        };

        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(TraceLayer::new_for_http())
    }
}

async fn dispatch(
    State(state): State<ListenerState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    match &state.upstream {
        Upstream::Static(files) => match files.clone().oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        },
        Upstream::Gateway(gateway) => gateway.handle(request, peer, state.secure).await,
    }
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = %detail, "Request handler panicked");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}
