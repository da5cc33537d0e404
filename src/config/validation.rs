//! Configuration validation.
//!
//! # Responsibilities
//! - Decide the serving mode (static files XOR FastCGI gateway)
//! - Check that referenced files and directories exist
//! - Parse listen addresses and the backend descriptor
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure apart from filesystem checks:
//!   Settings → Result<GatewayConfig, Vec<ValidationError>>
//! - Runs once, before any listener is bound

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::schema::Settings;
use crate::config::{GatewayConfig, ListenAddress, ServingMode, Timeouts, TlsListenerConfig};
use crate::fastcgi::BackendAddress;

/// A single semantic problem with the settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("choose exactly one of `root` (static files) or `backend` (FastCGI gateway)")]
    AmbiguousMode,

    #[error("static root {0:?} is not an existing directory")]
    RootNotFound(PathBuf),

    #[error("backend {0:?} is not in the `scheme:address` format")]
    InvalidBackend(String),

    #[error("backend transport {0:?} is not supported (use tcp or unix)")]
    UnsupportedTransport(String),

    #[error("`controller` is required when `backend` is set")]
    ControllerMissing,

    #[error("controller {0:?} is not an existing file")]
    ControllerNotFound(PathBuf),

    #[error("{field} address {value:?} is not in the `host:port` format")]
    InvalidListenAddress { field: &'static str, value: String },
}

/// Validate settings into the immutable gateway configuration.
pub fn validate(settings: &Settings) -> Result<GatewayConfig, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mode = match (&settings.root, &settings.backend) {
        (Some(root), None) => validate_root(root, &mut errors),
        (None, Some(backend)) => validate_proxy(backend, settings.controller.as_ref(), &mut errors),
        _ => {
            errors.push(ValidationError::AmbiguousMode);
            None
        }
    };

    let http = listen_address("http", &settings.http, &mut errors);

    let https = match (&settings.https, &settings.cert, &settings.key) {
        (Some(address), Some(cert), Some(key)) => {
            listen_address("https", address, &mut errors).map(|address| TlsListenerConfig {
                address,
                cert: cert.clone(),
                key: key.clone(),
            })
        }
        (None, None, None) => None,
        _ => {
            tracing::warn!(
                https = ?settings.https,
                cert = ?settings.cert,
                key = ?settings.key,
                "HTTPS needs an address, a certificate and a key; HTTPS listener disabled"
            );
            None
        }
    };

    match (mode, http) {
        (Some(mode), Some(http)) if errors.is_empty() => Ok(GatewayConfig {
            mode,
            http,
            https,
            query_string: settings.query_string,
            timeouts: Timeouts {
                dial: settings.timeouts.dial_secs.map(Duration::from_secs),
                backend: settings.timeouts.backend_secs.map(Duration::from_secs),
            },
        }),
        _ => Err(errors),
    }
}

fn validate_root(root: &PathBuf, errors: &mut Vec<ValidationError>) -> Option<ServingMode> {
    if !root.is_dir() {
        errors.push(ValidationError::RootNotFound(root.clone()));
        return None;
    }
    Some(ServingMode::Static { root: root.clone() })
}

fn validate_proxy(
    backend: &str,
    controller: Option<&PathBuf>,
    errors: &mut Vec<ValidationError>,
) -> Option<ServingMode> {
    let backend = match backend.split_once(':') {
        Some((scheme, address)) if !scheme.is_empty() && !address.is_empty() => {
            match BackendAddress::new(scheme, address) {
                Ok(backend) => Some(backend),
                Err(_) => {
                    errors.push(ValidationError::UnsupportedTransport(scheme.to_string()));
                    None
                }
            }
        }
        _ => {
            errors.push(ValidationError::InvalidBackend(backend.to_string()));
            None
        }
    };

    let controller = match controller {
        Some(path) if path.is_file() => Some(path.clone()),
        Some(path) => {
            errors.push(ValidationError::ControllerNotFound(path.clone()));
            None
        }
        None => {
            errors.push(ValidationError::ControllerMissing);
            None
        }
    };

    Some(ServingMode::Proxy {
        backend: backend?,
        controller: controller?,
    })
}

fn listen_address(
    field: &'static str,
    value: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<ListenAddress> {
    let address = ListenAddress::parse(value);
    if address.is_none() {
        errors.push(ValidationError::InvalidListenAddress {
            field,
            value: value.to_string(),
        });
    }
    address
}
