//! Configuration schema definitions.
//!
//! `Settings` is the raw, operator-facing shape of the configuration: every
//! field optional or defaulted so a TOML file may set any subset and the
//! command line may override the rest. Validation turns it into the
//! immutable [`GatewayConfig`](crate::config::GatewayConfig).

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Root of the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Static files root directory (static mode).
    pub root: Option<PathBuf>,

    /// FastCGI backend as `scheme:address`, e.g. `unix:/run/php-fpm.sock`.
    pub backend: Option<String>,

    /// Script every backend request executes (`SCRIPT_FILENAME`).
    pub controller: Option<PathBuf>,

    /// Plain HTTP listen address. `:port` means all interfaces.
    pub http: String,

    /// HTTPS listen address.
    pub https: Option<String>,

    /// TLS certificate chain (PEM).
    pub cert: Option<PathBuf>,

    /// TLS private key (PEM).
    pub key: Option<PathBuf>,

    /// How `QUERY_STRING` is derived from the request target.
    pub query_string: QueryStringMode,

    /// Backend deadlines.
    pub timeouts: TimeoutSettings,

    /// Default log filter when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: None,
            backend: None,
            controller: None,
            http: ":80".to_string(),
            https: None,
            cert: None,
            key: None,
            query_string: QueryStringMode::default(),
            timeouts: TimeoutSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

/// `QUERY_STRING` policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum QueryStringMode {
    /// Pass the query exactly as the client sent it.
    #[default]
    Raw,
    /// Parse and re-encode: keys sorted, values form-urlencoded.
    Canonical,
}

/// Backend deadlines in seconds. Absent means unbounded.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Deadline for establishing the backend connection.
    pub dial_secs: Option<u64>,

    /// Deadline for sending the request and receiving the response head.
    pub backend_secs: Option<u64>,
}
