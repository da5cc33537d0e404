//! FastCGI client: one request per connection.

use std::fmt;
use std::io;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use bytes::{Bytes, BytesMut};
use futures_util::{stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;

use super::codec::RecordCodec;
use super::record::{self, protocol_status, EndRequest, Record, RecordType, Role};
use super::Error;

/// Request id used on every connection. Connections carry a single request.
pub const REQUEST_ID: u16 = 1;

/// Header slots tried first when parsing a CGI response head.
const INITIAL_HEADERS: usize = 64;

/// Upper bound on header lines in a CGI response head.
const MAX_HEADERS: usize = 8192;

/// Byte stream a backend connection can run over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

/// Socket family used to reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Unix,
}

/// Where the FastCGI application listens, e.g. `tcp:127.0.0.1:9000` or
/// `unix:/run/php-fpm.sock`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendAddress {
    /// Scheme as given by the operator (`tcp`, `tcp4`, `tcp6`, `unix`).
    pub scheme: String,
    pub transport: Transport,
    pub address: String,
}

impl BackendAddress {
    pub fn new(scheme: &str, address: &str) -> Result<Self, Error> {
        let transport = match scheme {
            "tcp" | "tcp4" | "tcp6" => Transport::Tcp,
            "unix" => Transport::Unix,
            other => return Err(Error::UnsupportedTransport(other.to_string())),
        };
        Ok(Self {
            scheme: scheme.to_string(),
            transport,
            address: address.to_string(),
        })
    }
}

impl fmt::Display for BackendAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scheme, self.address)
    }
}

/// The backend's answer: CGI status line, headers, and the remaining
/// STDOUT stream as a body.
pub struct BackendResponse {
    /// Value of the CGI `Status` header, empty when the backend sent none.
    pub status_line: String,
    /// Response headers in the order received, `Status` removed.
    pub headers: HeaderMap,
    pub body: Body,
}

/// Open a fresh connection to the backend.
pub async fn dial(backend: &BackendAddress) -> Result<Connection, Error> {
    let stream: Box<dyn AsyncStream> = match backend.transport {
        Transport::Tcp => {
            let socket = TcpStream::connect(&backend.address).await?;
            socket.set_nodelay(true)?;
            Box::new(socket)
        }
        Transport::Unix => connect_unix(&backend.address).await?,
    };

    tracing::trace!(backend = %backend, "Backend connection established");
    Ok(Connection { stream })
}

#[cfg(unix)]
async fn connect_unix(path: &str) -> Result<Box<dyn AsyncStream>, Error> {
    let socket = tokio::net::UnixStream::connect(path).await?;
    Ok(Box::new(socket))
}

#[cfg(not(unix))]
async fn connect_unix(_path: &str) -> Result<Box<dyn AsyncStream>, Error> {
    Err(Error::UnsupportedTransport("unix".to_string()))
}

/// An open backend connection. Dropping it closes the socket.
pub struct Connection {
    stream: Box<dyn AsyncStream>,
}

impl Connection {
    pub fn new(stream: impl AsyncStream + 'static) -> Self {
        Self {
            stream: Box::new(stream),
        }
    }

    /// Run one request: send the environment and the request body, then
    /// wait for the CGI header block.
    ///
    /// The connection moves into the returned body, which streams the rest
    /// of STDOUT and closes the socket when dropped.
    pub async fn request<'a, I>(mut self, params: I, body: Body) -> Result<BackendResponse, Error>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut out = BytesMut::new();
        record::encode_begin_request(&mut out, REQUEST_ID, Role::Responder, 0);
        record::encode_params(&mut out, REQUEST_ID, params)?;
        self.stream.write_all(&out).await?;

        let mut body = body.into_data_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(Error::RequestBody)?;
            if chunk.is_empty() {
                continue;
            }
            out.clear();
            record::encode_stream(&mut out, RecordType::Stdin, REQUEST_ID, &chunk);
            self.stream.write_all(&out).await?;
        }
        out.clear();
        record::encode_record(&mut out, RecordType::Stdin, REQUEST_ID, &[]);
        self.stream.write_all(&out).await?;
        self.stream.flush().await?;

        let mut records = FramedRead::new(self.stream, RecordCodec);
        let mut head = BytesMut::new();
        let parsed = loop {
            let record = match records.next().await {
                Some(record) => expect_own(record?)?,
                None => return Err(Error::IncompleteHeaders),
            };
            match record.kind {
                RecordType::Stdout => {
                    head.extend_from_slice(&record.content);
                    if let Some(parsed) = parse_head(&head)? {
                        break parsed;
                    }
                }
                RecordType::Stderr => log_stderr(&record.content),
                RecordType::EndRequest => {
                    return match EndRequest::parse(&record.content) {
                        Some(end) if end.protocol_status != protocol_status::REQUEST_COMPLETE => {
                            Err(Error::Rejected(end.protocol_status))
                        }
                        _ => Err(Error::IncompleteHeaders),
                    };
                }
                other => return Err(Error::UnexpectedRecord(other)),
            }
        };

        let leftover = head.split_off(parsed.consumed).freeze();
        Ok(BackendResponse {
            status_line: parsed.status_line,
            headers: parsed.headers,
            body: Body::from_stream(stdout_stream(records, leftover)),
        })
    }
}

fn expect_own(record: Record) -> Result<Record, Error> {
    if record.request_id != REQUEST_ID {
        return Err(Error::ForeignRequest(record.request_id));
    }
    Ok(record)
}

/// Remaining STDOUT content after the header block, ending at END_REQUEST.
fn stdout_stream(
    records: FramedRead<Box<dyn AsyncStream>, RecordCodec>,
    leftover: Bytes,
) -> impl futures_util::Stream<Item = Result<Bytes, Error>> + Send + 'static {
    let first = stream::iter((!leftover.is_empty()).then(|| Ok(leftover)));

    let rest = stream::unfold(Some(records), |state| async move {
        let mut records = state?;
        loop {
            let record = match records.next().await {
                Some(Ok(record)) => record,
                Some(Err(e)) => return Some((Err(e), None)),
                None => {
                    tracing::warn!("Backend closed the connection before END_REQUEST");
                    let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "response truncated by backend");
                    return Some((Err(Error::Io(eof)), None));
                }
            };
            let record = match expect_own(record) {
                Ok(record) => record,
                Err(e) => return Some((Err(e), None)),
            };
            match record.kind {
                RecordType::Stdout if record.content.is_empty() => {}
                RecordType::Stdout => return Some((Ok(record.content), Some(records))),
                RecordType::Stderr => log_stderr(&record.content),
                RecordType::EndRequest => {
                    log_end_request(&record.content);
                    return None;
                }
                other => return Some((Err(Error::UnexpectedRecord(other)), None)),
            }
        }
    });

    first.chain(rest)
}

fn log_stderr(content: &[u8]) {
    let text = String::from_utf8_lossy(content);
    let text = text.trim_end();
    if !text.is_empty() {
        tracing::warn!(stderr = %text, "Backend reported an error");
    }
}

fn log_end_request(content: &[u8]) {
    match EndRequest::parse(content) {
        Some(end) if end.protocol_status != protocol_status::REQUEST_COMPLETE => {
            tracing::warn!(protocol_status = end.protocol_status, "Backend did not complete the request");
        }
        Some(end) if end.app_status != 0 => {
            tracing::debug!(app_status = end.app_status, "Backend exited with non-zero status");
        }
        Some(_) => {}
        None => tracing::warn!("Malformed END_REQUEST record"),
    }
}

struct ParsedHead {
    status_line: String,
    headers: HeaderMap,
    consumed: usize,
}

/// Parse the CGI header block, or `None` if it is not complete yet.
///
/// Header slots grow until the block fits or [`MAX_HEADERS`] is reached.
fn parse_head(buf: &[u8]) -> Result<Option<ParsedHead>, Error> {
    let mut capacity = INITIAL_HEADERS;
    loop {
        let mut slots = vec![httparse::EMPTY_HEADER; capacity];
        match httparse::parse_headers(buf, &mut slots) {
            Ok(httparse::Status::Complete((consumed, parsed))) => {
                return Ok(Some(collect_head(consumed, parsed)));
            }
            Ok(httparse::Status::Partial) => return Ok(None),
            Err(httparse::Error::TooManyHeaders) if capacity < MAX_HEADERS => capacity *= 2,
            Err(e) => return Err(e.into()),
        }
    }
}

fn collect_head(consumed: usize, parsed: &[httparse::Header<'_>]) -> ParsedHead {
    let mut status_line = None;
    let mut headers = HeaderMap::with_capacity(parsed.len());
    for header in parsed {
        if header.name.eq_ignore_ascii_case("status") {
            if status_line.is_none() {
                status_line = Some(String::from_utf8_lossy(header.value).trim().to_string());
            }
            continue;
        }
        match (
            HeaderName::from_bytes(header.name.as_bytes()),
            HeaderValue::from_bytes(header.value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::warn!(header = %header.name, "Dropping invalid backend header"),
        }
    }

    ParsedHead {
        status_line: status_line.unwrap_or_default(),
        headers,
        consumed,
    }
}
