//! FastCGI backend transport.
//!
//! # Data Flow
//! ```text
//! CGI environment + request body
//!     → client.rs (dial, BEGIN_REQUEST / PARAMS / STDIN)
//!     → record.rs (wire encoding)
//!     → backend application
//!     → codec.rs (record decoding)
//!     → client.rs (CGI header block, STDOUT body stream)
//! ```
//!
//! # Design Decisions
//! - One connection per request, closed when the response body is dropped
//! - Single request id per connection, no multiplexing
//! - Backend stderr is logged, never forwarded to the client

pub mod client;
pub mod codec;
pub mod record;

pub use client::{dial, BackendAddress, BackendResponse, Connection, Transport};

use thiserror::Error;

/// Errors raised while talking to a FastCGI backend.
#[derive(Debug, Error)]
pub enum Error {
    #[error("backend I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported backend transport {0:?}")]
    UnsupportedTransport(String),

    #[error("unsupported FastCGI version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown FastCGI record type {0}")]
    UnknownRecordType(u8),

    #[error("unexpected {0:?} record from backend")]
    UnexpectedRecord(record::RecordType),

    #[error("record for request {0} on a single-request connection")]
    ForeignRequest(u16),

    #[error("parameter {0} is too long to encode")]
    ParamTooLong(String),

    #[error("malformed name-value pairs")]
    MalformedParams,

    #[error("malformed CGI response headers: {0}")]
    MalformedHeaders(#[from] httparse::Error),

    #[error("backend ended the response before the header block was complete")]
    IncompleteHeaders,

    #[error("backend refused the request (protocol status {0})")]
    Rejected(u8),

    #[error("failed to read the request body: {0}")]
    RequestBody(#[source] axum::Error),
}
