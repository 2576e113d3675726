//! `tokio_util` codec for hosts that drive the channel from a tokio runtime.
//!
//! Unlike [`FrameBuffer`](crate::FrameBuffer), the framed buffer here grows
//! with the largest frame seen; the decode limit still bounds it.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_netstring, encode_netstring, MAX_CONTENT_LEN};
use crate::error::FrameError;

/// Netstring codec yielding raw frame content (tag byte included).
///
/// Pass the content to [`classify`](crate::classify) to tell control frames
/// from payload frames.
#[derive(Debug, Clone, Copy)]
pub struct NetstringCodec {
    max_content: usize,
}

impl NetstringCodec {
    pub fn new() -> Self {
        Self::with_max_content(MAX_CONTENT_LEN)
    }

    pub fn with_max_content(max_content: usize) -> Self {
        Self { max_content }
    }

    pub fn max_content(&self) -> usize {
        self.max_content
    }
}

impl Default for NetstringCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for NetstringCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, FrameError> {
        let (prefix, len) = match decode_netstring(src, self.max_content)? {
            Some(frame) => (frame.wire_len() - frame.len() - 1, frame.len()),
            None => return Ok(None),
        };

        src.advance(prefix);
        let content = src.split_to(len).freeze();
        src.advance(1);
        Ok(Some(content))
    }
}

impl Encoder<&[u8]> for NetstringCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_netstring(item, self.max_content, dst)
    }
}

impl Encoder<Bytes> for NetstringCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), FrameError> {
        encode_netstring(&item, self.max_content, dst)
    }
}
