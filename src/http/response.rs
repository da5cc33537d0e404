//! Response translation: CGI response → HTTP response.
//!
//! # Responsibilities
//! - Derive the HTTP status from the CGI `Status` header
//! - Copy backend headers, keeping every repeated value in order
//! - Stamp the gateway's `Server` header
//! - Short-circuit redirects and HEAD requests
//!
//! # Design Decisions
//! - Translation never fails; malformed status lines fall back to 200
//! - Bodies are streamed, never buffered; discarded bodies are dropped
//!   unread, which closes the backend connection

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, LOCATION, SERVER, TRANSFER_ENCODING};
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;

use crate::fastcgi::BackendResponse;
use crate::http::headers::{entries, merge};
use crate::http::request::normalize_path;
use crate::SERVER_SOFTWARE;

/// Status code named by a CGI status line such as `404 Not Found`.
///
/// Missing, non-numeric, informational-range-below-100 and out-of-range
/// codes all resolve to 200.
pub fn resolve_status(status_line: &str) -> StatusCode {
    status_line
        .split_whitespace()
        .next()
        .and_then(|token| token.parse::<u16>().ok())
        .filter(|code| *code >= 100)
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::OK)
}

/// Build the client response from the backend's answer.
pub fn translate(backend: BackendResponse, request_path: &str, head_only: bool) -> Response {
    let BackendResponse {
        status_line,
        headers,
        body,
    } = backend;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = resolve_status(&status_line);

    let outbound = response.headers_mut();
    merge(outbound, entries(headers));
    outbound.insert(SERVER, HeaderValue::from_static(SERVER_SOFTWARE));

    let location = outbound.get(LOCATION).filter(|v| !v.is_empty()).cloned();
    if let Some(location) = location {
        let resolved = resolve_location(&String::from_utf8_lossy(location.as_bytes()), request_path);
        outbound.insert(LOCATION, HeaderValue::from_str(&resolved).unwrap_or(location));
        outbound.remove(CONTENT_LENGTH);
        outbound.remove(TRANSFER_ENCODING);
        tracing::debug!(status = %response.status(), location = %resolved, "Backend redirect");
        return response;
    }

    if !head_only {
        *response.body_mut() = body;
    }
    response
}

/// Make a relative `Location` absolute against the directory of
/// `request_path`. Absolute URLs (with a scheme or authority) pass through.
pub fn resolve_location(location: &str, request_path: &str) -> String {
    if has_scheme(location) || location.starts_with("//") {
        return location.to_string();
    }

    let (path, query) = match location.find('?') {
        Some(i) => location.split_at(i),
        None => (location, ""),
    };

    let target = if path.starts_with('/') {
        path.to_string()
    } else {
        let dir = match request_path.rfind('/') {
            Some(i) => &request_path[..=i],
            None => "/",
        };
        format!("{dir}{path}")
    };

    let mut resolved = normalize_path(&target);
    resolved.push_str(query);
    resolved
}

fn has_scheme(location: &str) -> bool {
    let Some((scheme, _)) = location.split_once(':') else {
        return false;
    };
    scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
