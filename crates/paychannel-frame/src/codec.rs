use bytes::{BufMut, BytesMut};

use crate::error::{DecodeError, FrameError, Result};
use crate::kind::{CONTROL_TAG, PAYLOAD_TAG};

/// Maximum size of a header's JSON text or of a binary payload: 4 MiB.
pub const MAX_PAYLOAD_LEN: usize = 4 * 1024 * 1024;

/// Maximum netstring content: a full payload plus its `P` tag.
pub const MAX_CONTENT_LEN: usize = MAX_PAYLOAD_LEN + 1;

/// Receive buffer size that fits exactly one maximum-size frame.
pub const DEFAULT_BUFFER_CAPACITY: usize = encoded_len(MAX_CONTENT_LEN);

/// A decoded netstring, borrowed from the buffer it was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    content: &'a [u8],
    wire_len: usize,
}

impl<'a> Frame<'a> {
    /// The bytes between `:` and `,`.
    pub fn content(&self) -> &'a [u8] {
        self.content
    }

    /// Declared content length.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Bytes consumed from the input: digits, colon, content and comma.
    pub fn wire_len(&self) -> usize {
        self.wire_len
    }
}

/// Number of decimal digits needed to write `n`.
pub const fn digit_count(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

/// Exact wire size of a netstring carrying `content_len` bytes.
pub const fn encoded_len(content_len: usize) -> usize {
    digit_count(content_len) + 1 + content_len + 1
}

/// Encode `content` as a netstring.
///
/// Wire format:
/// ```text
/// ┌────────────────┬─────┬──────────────────┬─────┐
/// │ length (ASCII) │ ':' │ content (length) │ ',' │
/// └────────────────┴─────┴──────────────────┴─────┘
/// ```
///
/// Nothing is appended to `dst` when `content` is longer than `max`.
pub fn encode_netstring(content: &[u8], max: usize, dst: &mut BytesMut) -> Result<()> {
    if content.len() > max {
        return Err(FrameError::PayloadTooLarge {
            size: content.len(),
            max,
        });
    }
    put_netstring(&[content], dst);
    Ok(())
}

/// Encode header JSON text as a control frame.
pub fn encode_control_frame(text: &[u8], max: usize, dst: &mut BytesMut) -> Result<()> {
    if text.first() != Some(&CONTROL_TAG) {
        return Err(FrameError::NotControl);
    }
    encode_netstring(text, max, dst)
}

/// Encode binary data as a payload frame (`P` followed by the data).
///
/// `max` bounds the data itself; the tag byte does not count against it.
pub fn encode_payload_frame(data: &[u8], max: usize, dst: &mut BytesMut) -> Result<()> {
    if data.len() > max {
        return Err(FrameError::PayloadTooLarge {
            size: data.len(),
            max,
        });
    }
    put_netstring(&[&[PAYLOAD_TAG][..], data], dst);
    Ok(())
}

fn put_netstring(parts: &[&[u8]], dst: &mut BytesMut) {
    let len: usize = parts.iter().map(|part| part.len()).sum();
    dst.reserve(encoded_len(len));

    if len == 0 {
        dst.put_slice(b"0:,");
        return;
    }

    put_decimal(len, dst);
    dst.put_u8(b':');
    for part in parts {
        dst.put_slice(part);
    }
    dst.put_u8(b',');
}

fn put_decimal(mut n: usize, dst: &mut BytesMut) {
    let mut digits = [0u8; 20];
    let mut start = digits.len();
    loop {
        start -= 1;
        digits[start] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    dst.put_slice(&digits[start..]);
}

/// Decode one netstring from the front of `src`.
///
/// Returns `Ok(None)` if `src` doesn't hold a complete netstring yet. Nothing
/// is consumed; the caller advances by [`Frame::wire_len`].
pub fn decode_netstring(
    src: &[u8],
    max: usize,
) -> std::result::Result<Option<Frame<'_>>, DecodeError> {
    let Some(&first) = src.first() else {
        return Ok(None);
    };
    if !first.is_ascii_digit() {
        return Err(DecodeError::NoLength);
    }
    if first == b'0' {
        match src.get(1) {
            None => return Ok(None),
            Some(next) if next.is_ascii_digit() => return Err(DecodeError::LeadingZero),
            Some(_) => {}
        }
    }

    let mut len = 0usize;
    let mut digits = 0usize;
    for &byte in src.iter().take_while(|byte| byte.is_ascii_digit()) {
        len = len
            .saturating_mul(10)
            .saturating_add(usize::from(byte - b'0'));
        if len > max {
            return Err(DecodeError::TooLong { len, max });
        }
        digits += 1;
    }

    let Some(&separator) = src.get(digits) else {
        return Ok(None);
    };
    if separator != b':' {
        return Err(DecodeError::NoColon);
    }

    let start = digits + 1;
    let end = start
        .checked_add(len)
        .ok_or(DecodeError::TooLong { len, max })?;
    let Some(&terminator) = src.get(end) else {
        return Ok(None);
    };
    if terminator != b',' {
        return Err(DecodeError::NoComma);
    }

    Ok(Some(Frame {
        content: &src[start..end],
        wire_len: end + 1,
    }))
}

/// Configuration for framing on one channel.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum header text or payload size in bytes. Default: 4 MiB.
    pub max_payload_size: usize,
    /// Receive buffer capacity in bytes. Default: one maximum-size frame.
    pub buffer_capacity: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl FrameConfig {
    /// The decode limit matching `max_payload_size`, tag byte included.
    pub fn max_content_len(&self) -> usize {
        self.max_payload_size.saturating_add(1)
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD_LEN,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(content: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_netstring(content, MAX_CONTENT_LEN, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let content = b"hello, paychannel!";
        let wire = encode(content);

        assert_eq!(&wire[..], b"18:hello, paychannel!,");

        let frame = decode_netstring(&wire, MAX_CONTENT_LEN).unwrap().unwrap();
        assert_eq!(frame.content(), content);
        assert_eq!(frame.wire_len(), wire.len());
    }

    #[test]
    fn test_roundtrip_binary_lengths_across_digit_boundaries() {
        for len in [1usize, 9, 10, 99, 100, 1000, 65_536] {
            let content: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let wire = encode(&content);
            assert_eq!(wire.len(), encoded_len(len));

            let frame = decode_netstring(&wire, MAX_CONTENT_LEN).unwrap().unwrap();
            assert_eq!(frame.content(), content.as_slice());
            assert_eq!(frame.wire_len(), wire.len());
        }
    }

    #[test]
    fn test_empty_content() {
        let wire = encode(b"");
        assert_eq!(&wire[..], b"0:,");

        let frame = decode_netstring(b"0:,", MAX_CONTENT_LEN).unwrap().unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.wire_len(), 3);
    }

    #[test]
    fn test_decode_every_prefix_is_incomplete() {
        let wire = encode(b"{\"event\":\"x\"}");
        for cut in 0..wire.len() {
            let result = decode_netstring(&wire[..cut], MAX_CONTENT_LEN).unwrap();
            assert!(result.is_none(), "prefix of {cut} bytes decoded early");
        }
    }

    #[test]
    fn test_decode_leaves_trailing_bytes() {
        let mut wire = encode(b"first");
        wire.extend_from_slice(&encode(b"second"));

        let first = decode_netstring(&wire, MAX_CONTENT_LEN).unwrap().unwrap();
        assert_eq!(first.content(), b"first");

        let rest = &wire[first.wire_len()..];
        let second = decode_netstring(rest, MAX_CONTENT_LEN).unwrap().unwrap();
        assert_eq!(second.content(), b"second");
        assert_eq!(second.wire_len(), rest.len());
    }

    #[test]
    fn test_decode_leading_zero() {
        assert_eq!(
            decode_netstring(b"05:hello,", MAX_CONTENT_LEN),
            Err(DecodeError::LeadingZero)
        );
        assert_eq!(decode_netstring(b"0", MAX_CONTENT_LEN), Ok(None));
    }

    #[test]
    fn test_decode_no_length() {
        assert_eq!(
            decode_netstring(b":hello,", MAX_CONTENT_LEN),
            Err(DecodeError::NoLength)
        );
        assert_eq!(
            decode_netstring(b"x", MAX_CONTENT_LEN),
            Err(DecodeError::NoLength)
        );
    }

    #[test]
    fn test_decode_no_colon() {
        assert_eq!(
            decode_netstring(b"5;hello,", MAX_CONTENT_LEN),
            Err(DecodeError::NoColon)
        );
    }

    #[test]
    fn test_decode_no_comma() {
        assert_eq!(
            decode_netstring(b"5:hello;", MAX_CONTENT_LEN),
            Err(DecodeError::NoComma)
        );
    }

    #[test]
    fn test_decode_too_long_detected_from_digits() {
        assert_eq!(
            decode_netstring(b"17", 16),
            Err(DecodeError::TooLong { len: 17, max: 16 })
        );
        assert!(matches!(
            decode_netstring(b"99999999999999999999999999", MAX_CONTENT_LEN),
            Err(DecodeError::TooLong { .. })
        ));
        assert_eq!(decode_netstring(b"16", 16), Ok(None));
    }

    #[test]
    fn test_encode_rejects_oversize_without_writing() {
        let mut buf = BytesMut::new();
        let err = encode_netstring(b"oversized", 4, &mut buf).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge { size: 9, max: 4 }
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_payload_frame_is_tagged() {
        let mut buf = BytesMut::new();
        encode_payload_frame(&[0x01, 0x02, 0x03], MAX_PAYLOAD_LEN, &mut buf).unwrap();
        assert_eq!(&buf[..], b"4:P\x01\x02\x03,");

        buf.clear();
        encode_payload_frame(&[], MAX_PAYLOAD_LEN, &mut buf).unwrap();
        assert_eq!(&buf[..], b"1:P,");
    }

    #[test]
    fn test_payload_frame_limit_excludes_tag() {
        let mut buf = BytesMut::new();
        encode_payload_frame(&[0u8; 8], 8, &mut buf).unwrap();
        assert_eq!(buf.len(), encoded_len(9));

        buf.clear();
        let err = encode_payload_frame(&[0u8; 9], 8, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_control_frame_requires_object_text() {
        let mut buf = BytesMut::new();
        let err = encode_control_frame(b"[1,2,3]", MAX_PAYLOAD_LEN, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::NotControl));

        encode_control_frame(b"{}", MAX_PAYLOAD_LEN, &mut buf).unwrap();
        assert_eq!(&buf[..], b"2:{},");
    }

    #[test]
    fn test_default_capacity_fits_largest_frame() {
        assert_eq!(digit_count(MAX_CONTENT_LEN), 7);
        assert_eq!(DEFAULT_BUFFER_CAPACITY, 7 + 1 + MAX_PAYLOAD_LEN + 1 + 1);
        assert_eq!(FrameConfig::default().max_content_len(), MAX_CONTENT_LEN);
    }
}
