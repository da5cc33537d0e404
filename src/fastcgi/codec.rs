//! Streaming record decoder for use with `tokio_util::codec::FramedRead`.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use super::record::{Record, RecordType, HEADER_LEN, VERSION_1};
use super::Error;

/// Splits a byte stream into FastCGI records.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordCodec;

impl Decoder for RecordCodec {
    type Item = Record;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Record>, Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        if src[0] != VERSION_1 {
            return Err(Error::UnsupportedVersion(src[0]));
        }
        let kind = RecordType::from_u8(src[1]).ok_or(Error::UnknownRecordType(src[1]))?;
        let request_id = u16::from_be_bytes([src[2], src[3]]);
        let content_len = u16::from_be_bytes([src[4], src[5]]) as usize;
        let padding_len = src[6] as usize;

        let total = HEADER_LEN + content_len + padding_len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        frame.advance(HEADER_LEN);
        let content = frame.split_to(content_len).freeze();

        Ok(Some(Record {
            kind,
            request_id,
            content,
        }))
    }
}
