//! Proxy-mode request handler.
//!
//! # Data Flow
//! ```text
//! request + peer address
//!     → request.rs (CGI environment)
//!     → fastcgi::dial (fresh connection, optional dial deadline)
//!     → Connection::request (environment, streamed body, optional deadline)
//!     → response.rs (status, headers, body)
//! ```
//!
//! Failures never escape the handler: each is logged and answered with a
//! fixed gateway error response.

use std::io;
use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::config::Timeouts;
use crate::fastcgi::{self, BackendResponse};
use crate::http::request::{build_environment, CgiEnvironment, EnvironmentContext};
use crate::http::response::translate;
use crate::resilience::timeouts::{with_deadline, DeadlineElapsed};

/// A failed backend round trip.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unable to connect to the backend: {0}")]
    Unreachable(#[source] fastcgi::Error),

    #[error("unable to fetch the response from the backend: {0}")]
    Exchange(#[source] fastcgi::Error),

    #[error("backend did not answer in time: {0}")]
    TimedOut(#[from] DeadlineElapsed),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            GatewayError::Unreachable(_) => (StatusCode::BAD_GATEWAY, "Unable to connect to the backend"),
            GatewayError::Exchange(_) => (StatusCode::BAD_GATEWAY, "Unable to fetch the response from the backend"),
            GatewayError::TimedOut(_) => (StatusCode::GATEWAY_TIMEOUT, "Backend did not respond in time"),
        };
        (status, message).into_response()
    }
}

/// Translates HTTP requests into FastCGI requests against one backend.
#[derive(Debug)]
pub struct Gateway {
    context: EnvironmentContext,
    timeouts: Timeouts,
}

impl Gateway {
    pub fn new(context: EnvironmentContext, timeouts: Timeouts) -> Self {
        Self { context, timeouts }
    }

    /// Serve one request. `secure` is set for requests arriving over TLS.
    pub async fn handle(&self, request: Request<Body>, peer: SocketAddr, secure: bool) -> Response {
        let (parts, body) = request.into_parts();
        let env = build_environment(&parts, peer, &self.context, secure);

        match self.exchange(&env, body).await {
            Ok(backend) => translate(backend, parts.uri.path(), parts.method == Method::HEAD),
            Err(e) => {
                tracing::error!(
                    backend = %self.context.backend,
                    method = %parts.method,
                    uri = %parts.uri,
                    peer = %peer,
                    error = %e,
                    "FastCGI request failed"
                );
                e.into_response()
            }
        }
    }

    async fn exchange(&self, env: &CgiEnvironment, body: Body) -> Result<BackendResponse, GatewayError> {
        let connection = with_deadline(self.timeouts.dial, fastcgi::dial(&self.context.backend))
            .await
            .map_err(|elapsed| fastcgi::Error::Io(io::Error::new(io::ErrorKind::TimedOut, elapsed)))
            .and_then(|dialed| dialed)
            .map_err(GatewayError::Unreachable)?;

        tracing::debug!(backend = %self.context.backend, params = env.len(), "Sending FastCGI request");

        with_deadline(self.timeouts.backend, connection.request(env.iter(), body))
            .await?
            .map_err(GatewayError::Exchange)
    }
}
