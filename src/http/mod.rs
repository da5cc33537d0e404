//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum router, tracing, panic isolation)
//!     → static mode: tower-http ServeDir
//!     → proxy mode: gateway.rs
//!         → request.rs (CGI environment)
//!         → fastcgi (backend round trip)
//!         → response.rs (status, headers, redirects, HEAD)
//!     → Send to client
//! ```

pub mod gateway;
pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use gateway::{Gateway, GatewayError};
pub use request::{build_environment, CgiEnvironment, EnvironmentContext};
pub use server::GatewayServer;
