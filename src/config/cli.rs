//! Command-line flags.

use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::{load_settings, ConfigError};
use crate::config::schema::{QueryStringMode, Settings};
use crate::config::validation::validate;
use crate::config::GatewayConfig;

#[derive(Debug, Default, Parser)]
#[command(name = "cgi-gateway")]
#[command(version, about = "Static file server or HTTP to FastCGI gateway", long_about = None)]
pub struct CliArgs {
    /// Serve static files from this directory, e.g. "/var/www/".
    /// Directories answer with their index.html, never a listing.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// FastCGI backend as scheme:address, e.g. "unix:/var/run/php-fpm.sock"
    #[arg(long)]
    pub backend: Option<String>,

    /// Main script of the FastCGI application (SCRIPT_FILENAME), e.g. "/var/www/main.php"
    #[arg(long)]
    pub controller: Option<PathBuf>,

    /// Plain HTTP listen address [default: :80]
    #[arg(long)]
    pub http: Option<String>,

    /// HTTPS listen address, e.g. ":443"
    #[arg(long)]
    pub https: Option<String>,

    /// TLS certificate file (PEM)
    #[arg(long)]
    pub cert: Option<PathBuf>,

    /// TLS private key file (PEM)
    #[arg(long)]
    pub key: Option<PathBuf>,

    /// TOML file providing defaults for any of the above
    #[arg(short = 'f', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Seconds to wait for the backend connection
    #[arg(long, value_name = "SECS")]
    pub dial_timeout: Option<u64>,

    /// Seconds to wait for the backend response headers
    #[arg(long, value_name = "SECS")]
    pub backend_timeout: Option<u64>,

    /// QUERY_STRING policy: pass the client's query through, or re-encode it with keys sorted
    #[arg(long, value_enum, value_name = "MODE")]
    pub query_string: Option<QueryStringMode>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long)]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Lay these flags over `settings`; flags win.
    pub fn apply(self, mut settings: Settings) -> Settings {
        if let Some(root) = self.root {
            settings.root = Some(root);
        }
        if let Some(backend) = self.backend {
            settings.backend = Some(backend);
        }
        if let Some(controller) = self.controller {
            settings.controller = Some(controller);
        }
        if let Some(http) = self.http {
            settings.http = http;
        }
        if let Some(https) = self.https {
            settings.https = Some(https);
        }
        if let Some(cert) = self.cert {
            settings.cert = Some(cert);
        }
        if let Some(key) = self.key {
            settings.key = Some(key);
        }
        if let Some(secs) = self.dial_timeout {
            settings.timeouts.dial_secs = Some(secs);
        }
        if let Some(secs) = self.backend_timeout {
            settings.timeouts.backend_secs = Some(secs);
        }
        if let Some(mode) = self.query_string {
            settings.query_string = mode;
        }
        if let Some(level) = self.log_level {
            settings.log_level = level;
        }
        settings
    }

    /// Load the optional file, apply flags, and return the merged settings.
    pub fn into_settings(mut self) -> Result<Settings, ConfigError> {
        let base = match self.config.take() {
            Some(path) => load_settings(&path)?,
            None => Settings::default(),
        };
        Ok(self.apply(base))
    }
}

/// Validate merged settings into the immutable configuration.
pub fn resolve(settings: &Settings) -> Result<GatewayConfig, ConfigError> {
    validate(settings).map_err(ConfigError::Validation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_parse() {
        let args = CliArgs::try_parse_from([
            "cgi-gateway",
            "--backend",
            "tcp:127.0.0.1:9000",
            "--controller",
            "/srv/index.php",
            "--http",
            ":8080",
            "--query-string",
            "canonical",
            "--dial-timeout",
            "2",
        ])
        .unwrap();

        assert_eq!(args.backend.as_deref(), Some("tcp:127.0.0.1:9000"));
        assert_eq!(args.http.as_deref(), Some(":8080"));
        assert_eq!(args.query_string, Some(QueryStringMode::Canonical));
        assert_eq!(args.dial_timeout, Some(2));
    }

    #[test]
    fn flags_override_file_values() {
        let file = Settings {
            backend: Some("unix:/run/a.sock".to_string()),
            http: ":8000".to_string(),
            https: Some(":8443".to_string()),
            ..Settings::default()
        };
        let args = CliArgs {
            backend: Some("tcp:10.0.0.2:9000".to_string()),
            query_string: Some(QueryStringMode::Canonical),
            ..CliArgs::default()
        };

        let merged = args.apply(file);
        assert_eq!(merged.backend.as_deref(), Some("tcp:10.0.0.2:9000"));
        assert_eq!(merged.http, ":8000");
        assert_eq!(merged.https.as_deref(), Some(":8443"));
        assert_eq!(merged.query_string, QueryStringMode::Canonical);
    }

    #[test]
    fn raw_query_flag_overrides_canonical_file() {
        let file = Settings {
            query_string: QueryStringMode::Canonical,
            ..Settings::default()
        };
        let args = CliArgs::try_parse_from(["cgi-gateway", "--query-string", "raw"]).unwrap();

        assert_eq!(args.apply(file).query_string, QueryStringMode::Raw);
    }

    #[test]
    fn unknown_query_mode_is_rejected() {
        assert!(CliArgs::try_parse_from(["cgi-gateway", "--query-string", "sorted"]).is_err());
    }

    #[test]
    fn default_http_address() {
        let settings = CliArgs::default().into_settings().unwrap();
        assert_eq!(settings.http, ":80");
    }

    #[test]
    fn resolve_reports_validation_errors() {
        let err = resolve(&Settings::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
    }
}
