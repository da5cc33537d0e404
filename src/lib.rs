//! Static file server and HTTP to FastCGI gateway.

pub mod config;
pub mod fastcgi;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;

/// Gateway identity, sent as `Server` and `SERVER_SOFTWARE`.
pub const SERVER_SOFTWARE: &str = concat!("cgi-gateway/v", env!("CARGO_PKG_VERSION"));

pub use config::GatewayConfig;
pub use http::{Gateway, GatewayServer};
pub use lifecycle::Shutdown;
