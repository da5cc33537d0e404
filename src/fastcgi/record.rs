//! FastCGI record layout and encoding.
//!
//! Every record starts with an 8-byte header:
//!
//! ```text
//! version | type | request id (u16 BE) | content length (u16 BE) | padding | reserved
//! ```
//!
//! Content is padded so the next header starts on an 8-byte boundary.

use bytes::{BufMut, Bytes, BytesMut};

use super::Error;

/// The only protocol version in existence.
pub const VERSION_1: u8 = 1;

/// Size of a record header on the wire.
pub const HEADER_LEN: usize = 8;

/// Largest content a single record can carry.
pub const MAX_CONTENT_LEN: usize = u16::MAX as usize;

/// Record types defined by the FastCGI 1.0 specification.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    BeginRequest = 1,
    AbortRequest = 2,
    EndRequest = 3,
    Params = 4,
    Stdin = 5,
    Stdout = 6,
    Stderr = 7,
    Data = 8,
    GetValues = 9,
    GetValuesResult = 10,
    UnknownType = 11,
}

impl RecordType {
    pub fn from_u8(value: u8) -> Option<Self> {
        let kind = match value {
            1 => RecordType::BeginRequest,
            2 => RecordType::AbortRequest,
            3 => RecordType::EndRequest,
            4 => RecordType::Params,
            5 => RecordType::Stdin,
            6 => RecordType::Stdout,
            7 => RecordType::Stderr,
            8 => RecordType::Data,
            9 => RecordType::GetValues,
            10 => RecordType::GetValuesResult,
            11 => RecordType::UnknownType,
            _ => return None,
        };
        Some(kind)
    }
}

/// Application roles.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Responder = 1,
    Authorizer = 2,
    Filter = 3,
}

/// `FCGI_KEEP_CONN` flag of a BEGIN_REQUEST body.
pub const FLAG_KEEP_CONN: u8 = 1;

/// Protocol status codes carried by END_REQUEST.
pub mod protocol_status {
    pub const REQUEST_COMPLETE: u8 = 0;
    pub const CANT_MPX_CONN: u8 = 1;
    pub const OVERLOADED: u8 = 2;
    pub const UNKNOWN_ROLE: u8 = 3;
}

/// A decoded record. Padding is already stripped from `content`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub kind: RecordType,
    pub request_id: u16,
    pub content: Bytes,
}

/// Body of an END_REQUEST record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndRequest {
    pub app_status: u32,
    pub protocol_status: u8,
}

impl EndRequest {
    pub fn parse(content: &[u8]) -> Option<Self> {
        if content.len() < 5 {
            return None;
        }
        Some(Self {
            app_status: u32::from_be_bytes([content[0], content[1], content[2], content[3]]),
            protocol_status: content[4],
        })
    }
}

fn padding_for(content_len: usize) -> usize {
    (8 - content_len % 8) % 8
}

/// Append one record. `content` must fit in a single record.
pub fn encode_record(dst: &mut BytesMut, kind: RecordType, request_id: u16, content: &[u8]) {
    debug_assert!(content.len() <= MAX_CONTENT_LEN);
    let padding = padding_for(content.len());

    dst.reserve(HEADER_LEN + content.len() + padding);
    dst.put_u8(VERSION_1);
    dst.put_u8(kind as u8);
    dst.put_u16(request_id);
    dst.put_u16(content.len() as u16);
    dst.put_u8(padding as u8);
    dst.put_u8(0);
    dst.put_slice(content);
    dst.put_bytes(0, padding);
}

/// Append `content` as a sequence of stream records of the given type.
///
/// Does not write the empty terminating record; streams are closed with
/// an explicit `encode_record(.., &[])`.
pub fn encode_stream(dst: &mut BytesMut, kind: RecordType, request_id: u16, content: &[u8]) {
    for chunk in content.chunks(MAX_CONTENT_LEN) {
        encode_record(dst, kind, request_id, chunk);
    }
}

pub fn encode_begin_request(dst: &mut BytesMut, request_id: u16, role: Role, flags: u8) {
    let role = (role as u16).to_be_bytes();
    let body = [role[0], role[1], flags, 0, 0, 0, 0, 0];
    encode_record(dst, RecordType::BeginRequest, request_id, &body);
}

pub fn encode_end_request(dst: &mut BytesMut, request_id: u16, end: EndRequest) {
    let status = end.app_status.to_be_bytes();
    let body = [status[0], status[1], status[2], status[3], end.protocol_status, 0, 0, 0];
    encode_record(dst, RecordType::EndRequest, request_id, &body);
}

fn put_length(dst: &mut BytesMut, len: usize) {
    if len > 127 {
        dst.put_u32(len as u32 | 0x8000_0000);
    } else {
        dst.put_u8(len as u8);
    }
}

/// Append one name-value pair in the FastCGI length-prefixed format.
pub fn encode_name_value(dst: &mut BytesMut, name: &[u8], value: &[u8]) -> Result<(), Error> {
    const MAX_PAIR_LEN: usize = 0x7fff_ffff;
    if name.len() > MAX_PAIR_LEN || value.len() > MAX_PAIR_LEN {
        return Err(Error::ParamTooLong(String::from_utf8_lossy(name).into_owned()));
    }
    put_length(dst, name.len());
    put_length(dst, value.len());
    dst.put_slice(name);
    dst.put_slice(value);
    Ok(())
}

/// Append a complete PARAMS stream, including its empty terminator.
pub fn encode_params<'a, I>(dst: &mut BytesMut, request_id: u16, params: I) -> Result<(), Error>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut pairs = BytesMut::new();
    for (name, value) in params {
        encode_name_value(&mut pairs, name.as_bytes(), value.as_bytes())?;
    }
    encode_stream(dst, RecordType::Params, request_id, &pairs);
    encode_record(dst, RecordType::Params, request_id, &[]);
    Ok(())
}

fn take_length(src: &mut &[u8]) -> Option<usize> {
    let first = *src.first()?;
    if first & 0x80 == 0 {
        *src = &src[1..];
        return Some(first as usize);
    }
    if src.len() < 4 {
        return None;
    }
    let len = u32::from_be_bytes([first & 0x7f, src[1], src[2], src[3]]) as usize;
    *src = &src[4..];
    Some(len)
}

/// Decode a concatenated PARAMS payload into its name-value pairs.
pub fn decode_params(mut src: &[u8]) -> Result<Vec<(Bytes, Bytes)>, Error> {
    let mut pairs = Vec::new();
    while !src.is_empty() {
        let name_len = take_length(&mut src).ok_or(Error::MalformedParams)?;
        let value_len = take_length(&mut src).ok_or(Error::MalformedParams)?;
        if src.len() < name_len + value_len {
            return Err(Error::MalformedParams);
        }
        let name = Bytes::copy_from_slice(&src[..name_len]);
        let value = Bytes::copy_from_slice(&src[name_len..name_len + value_len]);
        src = &src[name_len + value_len..];
        pairs.push((name, value));
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_is_padded_to_eight_bytes() {
        let mut buf = BytesMut::new();
        encode_record(&mut buf, RecordType::Stdin, 1, b"hello");

        assert_eq!(buf.len(), HEADER_LEN + 8);
        assert_eq!(&buf[..HEADER_LEN], &[1, 5, 0, 1, 0, 5, 3, 0]);
        assert_eq!(&buf[HEADER_LEN..HEADER_LEN + 5], b"hello");
        assert_eq!(&buf[HEADER_LEN + 5..], &[0, 0, 0]);
    }

    #[test]
    fn long_stream_is_split() {
        let content = vec![b'x'; MAX_CONTENT_LEN + 10];
        let mut buf = BytesMut::new();
        encode_stream(&mut buf, RecordType::Stdin, 1, &content);

        // first record: 65535 bytes of content + 1 byte of padding
        let first_len = HEADER_LEN + MAX_CONTENT_LEN + 1;
        assert_eq!(&buf[4..6], &[0xff, 0xff]);
        assert_eq!(&buf[first_len + 4..first_len + 6], &[0, 10]);
        assert_eq!(buf.len(), first_len + HEADER_LEN + 16);
    }

    #[test]
    fn begin_request_layout() {
        let mut buf = BytesMut::new();
        encode_begin_request(&mut buf, 1, Role::Responder, 0);
        assert_eq!(&buf[..], &[1, 1, 0, 1, 0, 8, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn long_values_use_four_byte_lengths() {
        let value = "v".repeat(200);
        let mut buf = BytesMut::new();
        encode_name_value(&mut buf, b"NAME", value.as_bytes()).unwrap();

        assert_eq!(buf[0], 4);
        assert_eq!(&buf[1..5], &[0x80, 0, 0, 200]);

        let pairs = decode_params(&buf).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(&pairs[0].0[..], b"NAME");
        assert_eq!(pairs[0].1.len(), 200);
    }

    #[test]
    fn truncated_params_are_rejected() {
        assert!(matches!(decode_params(&[4, 2, b'N']), Err(Error::MalformedParams)));
    }

    #[test]
    fn end_request_parse() {
        let mut buf = BytesMut::new();
        encode_end_request(
            &mut buf,
            1,
            EndRequest { app_status: 258, protocol_status: protocol_status::OVERLOADED },
        );
        let end = EndRequest::parse(&buf[HEADER_LEN..]).unwrap();
        assert_eq!(end.app_status, 258);
        assert_eq!(end.protocol_status, protocol_status::OVERLOADED);
    }
}
