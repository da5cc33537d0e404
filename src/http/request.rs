//! Request transformation: HTTP request → CGI environment.
//!
//! # Responsibilities
//! - Build the CGI/1.1 variables the backend application reads
//! - Expose every request header as an `HTTP_*` variable
//! - Describe the listener (plain or TLS) the request arrived on
//!
//! # Design Decisions
//! - Variables are kept sorted so identical requests produce identical
//!   environments
//! - Construction is total: malformed input degrades to empty or
//!   sentinel values instead of failing the request

use std::borrow::Cow;
use std::collections::btree_map::{BTreeMap, Entry};
use std::net::SocketAddr;
use std::path::Path;

use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST, TRANSFER_ENCODING};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use percent_encoding::percent_decode_str;
use url::form_urlencoded;

use crate::config::{GatewayConfig, ListenAddress, QueryStringMode};
use crate::fastcgi::BackendAddress;
use crate::http::headers::MultiMap;
use crate::SERVER_SOFTWARE;

/// Header a trusted front proxy uses to pass the original request target.
const REQUEST_URI_HEADER: &str = "request-uri";

/// CGI variables for one request, sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgiEnvironment {
    vars: BTreeMap<String, String>,
}

impl CgiEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name`, replacing any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl MultiMap for CgiEnvironment {
    type Name = String;
    type Value = String;

    /// Repeated values are joined with `;`.
    fn insert_or_append(&mut self, name: String, value: String) {
        match self.vars.entry(name) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => {
                let joined = slot.get_mut();
                joined.push(';');
                joined.push_str(&value);
            }
        }
    }
}

/// Per-gateway constants that flow into every environment.
#[derive(Debug, Clone)]
pub struct EnvironmentContext {
    pub controller: String,
    pub backend: BackendAddress,
    pub http: ListenAddress,
    pub https: Option<TlsContext>,
    pub query_string: QueryStringMode,
}

/// TLS listener facts exposed to the backend.
#[derive(Debug, Clone)]
pub struct TlsContext {
    pub address: ListenAddress,
    pub cert: String,
    pub key: String,
}

impl EnvironmentContext {
    /// Context for a proxy-mode gateway talking to `backend`.
    pub fn new(config: &GatewayConfig, backend: &BackendAddress, controller: &Path) -> Self {
        Self {
            controller: controller.to_string_lossy().into_owned(),
            backend: backend.clone(),
            http: config.http.clone(),
            https: config.https.as_ref().map(|tls| TlsContext {
                address: tls.address.clone(),
                cert: tls.cert.to_string_lossy().into_owned(),
                key: tls.key.to_string_lossy().into_owned(),
            }),
            query_string: config.query_string,
        }
    }
}

/// Build the CGI environment for one request.
pub fn build_environment(
    parts: &Parts,
    peer: SocketAddr,
    context: &EnvironmentContext,
    secure: bool,
) -> CgiEnvironment {
    let mut env = CgiEnvironment::new();

    let host = request_host(parts);
    let path = normalize_path(&percent_decode_str(parts.uri.path()).decode_utf8_lossy());
    let query = parts.uri.query().unwrap_or("");
    let remote_addr = peer.ip().to_string();

    env.insert("SCRIPT_FILENAME", context.controller.as_str());
    env.insert("REQUEST_METHOD", parts.method.as_str());
    env.insert("REQUEST_URI", request_uri(parts));
    env.insert("REQUEST_PATH", path.as_str());
    env.insert("PATH_INFO", path);
    env.insert("CONTENT_LENGTH", content_length(&parts.headers));
    env.insert("CONTENT_TYPE", header_text(parts.headers.get(CONTENT_TYPE)));
    env.insert("REMOTE_ADDR", remote_addr.as_str());
    env.insert("REMOTE_PORT", peer.port().to_string());
    env.insert("REMOTE_HOST", remote_addr);
    env.insert(
        "QUERY_STRING",
        match context.query_string {
            QueryStringMode::Canonical => canonical_query(query),
            QueryStringMode::Raw => query.to_string(),
        },
    );
    env.insert("SERVER_SOFTWARE", SERVER_SOFTWARE);
    env.insert("SERVER_NAME", host.as_str());
    env.insert("SERVER_PROTOCOL", format!("{:?}", parts.version));
    env.insert("GATEWAY_INTERFACE", "CGI/1.1");
    env.insert("FCGI_PROTOCOL", context.backend.scheme.as_str());
    env.insert("FCGI_ADDR", context.backend.address.as_str());
    env.insert("HTTP_HOST", host);

    let tls = context.https.as_ref().filter(|_| secure);
    let server = tls.map_or(&context.http, |tls| &tls.address);
    env.insert("SERVER_ADDR", server.host.as_str());
    env.insert("SERVER_PORT", server.port.to_string());
    env.insert("HTTPS", if secure { "on" } else { "off" });
    if let Some(tls) = tls {
        env.insert("SSL_CERT", tls.cert.as_str());
        env.insert("SSL_KEY", tls.key.as_str());
    }

    for (name, value) in parts.headers.iter() {
        if *name == HOST || name.as_str() == REQUEST_URI_HEADER {
            continue;
        }
        let var = format!("HTTP_{}", name.as_str().to_ascii_uppercase().replace('-', "_"));
        env.insert_or_append(var, header_text(Some(value)));
    }

    env
}

fn header_text(value: Option<&HeaderValue>) -> String {
    value
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default()
}

fn request_host(parts: &Parts) -> String {
    match parts.headers.get(HOST) {
        Some(host) => header_text(Some(host)),
        None => parts
            .uri
            .authority()
            .map(|a| a.as_str().to_string())
            .unwrap_or_default(),
    }
}

/// An empty `Request-Uri` header counts as absent.
fn request_uri(parts: &Parts) -> String {
    let passed = header_text(parts.headers.get(REQUEST_URI_HEADER));
    if !passed.is_empty() {
        return passed;
    }
    parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

/// Declared body length; `0` without a body, `-1` when the length is
/// unknown (chunked) or unreadable.
fn content_length(headers: &HeaderMap) -> String {
    match headers.get(CONTENT_LENGTH) {
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-1".to_string()),
        None if headers.contains_key(TRANSFER_ENCODING) => "-1".to_string(),
        None => "0".to_string(),
    }
}

/// Parse the query and re-encode it with keys in sorted order. Values of a
/// repeated key keep their original order.
pub fn canonical_query(query: &str) -> String {
    let mut params: BTreeMap<Cow<'_, str>, Vec<Cow<'_, str>>> = BTreeMap::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        params.entry(key).or_default().push(value);
    }

    let mut encoded = form_urlencoded::Serializer::new(String::new());
    for (key, values) in &params {
        for value in values {
            encoded.append_pair(key, value);
        }
    }
    encoded.finish()
}

/// Resolve `.` and `..` segments and collapse repeated separators.
///
/// The result always starts with `/`; a trailing `/` (or a trailing dot
/// segment) yields a trailing `/`. `..` never climbs above the root.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    let mut trailing_slash = false;

    for segment in path.split('/') {
        match segment {
            "" | "." => trailing_slash = true,
            ".." => {
                segments.pop();
                trailing_slash = true;
            }
            segment => {
                segments.push(segment);
                trailing_slash = false;
            }
        }
    }

    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in &segments {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if trailing_slash || normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}
