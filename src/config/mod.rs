//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML)
//!     → loader.rs (parse & deserialize into Settings)
//!     → cli.rs (command-line flags override file values)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc with every listener and request
//! ```
//!
//! # Design Decisions
//! - Config is immutable once validated; there is no reload
//! - All settings have defaults to allow minimal invocations
//! - The serving mode is a sum type, decided once at startup

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub use cli::CliArgs;
pub use loader::ConfigError;
pub use schema::{QueryStringMode, Settings};

use crate::fastcgi::BackendAddress;

/// Validated gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub mode: ServingMode,
    /// Plain HTTP listener, always started.
    pub http: ListenAddress,
    /// HTTPS listener, started only when fully configured.
    pub https: Option<TlsListenerConfig>,
    pub query_string: QueryStringMode,
    pub timeouts: Timeouts,
}

/// What every request is served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServingMode {
    /// Serve files below `root`.
    Static { root: PathBuf },
    /// Translate requests to FastCGI and run `controller` on `backend`.
    Proxy {
        backend: BackendAddress,
        controller: PathBuf,
    },
}

/// A `host:port` listen address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenAddress {
    pub host: String,
    pub port: u16,
    raw: String,
}

impl ListenAddress {
    /// Parse `host:port`, expanding a bare `:port` to all interfaces.
    pub fn parse(value: &str) -> Option<Self> {
        let raw = if value.starts_with(':') {
            format!("0.0.0.0{value}")
        } else {
            value.to_string()
        };

        let (host, port) = raw.rsplit_once(':')?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host)
            .to_string();
        if host.is_empty() {
            return None;
        }
        let port = port.parse().ok()?;

        Some(Self { host, port, raw })
    }

    /// The address in a form `lookup_host` and `TcpListener::bind` accept.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// HTTPS listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsListenerConfig {
    pub address: ListenAddress,
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Backend deadlines. `None` leaves the operation unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeouts {
    pub dial: Option<Duration>,
    pub backend: Option<Duration>,
}
