/// Structural faults found while decoding a netstring.
///
/// None of these can be fixed by waiting for more input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The declared length exceeds the configured maximum.
    #[error("netstring length {len} exceeds maximum {max}")]
    TooLong { len: usize, max: usize },

    /// The length digits are not followed by `:`.
    #[error("netstring length is not followed by ':'")]
    NoColon,

    /// The content is not followed by `,`.
    #[error("netstring content is not followed by ','")]
    NoComma,

    /// The length has a leading zero.
    #[error("netstring length has a leading zero")]
    LeadingZero,

    /// The input does not start with a decimal length.
    #[error("netstring does not start with a length")]
    NoLength,
}

/// Conditions reported while reassembling frames from the receive buffer.
///
/// These are non-fatal: the offending bytes are dropped and parsing resumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameCondition {
    /// A framing error; every buffered byte was discarded.
    #[error("malformed frame: {0}")]
    Malformed(DecodeError),

    /// An unfinished frame filled the whole buffer; every buffered byte was discarded.
    #[error("unfinished frame does not fit in the {capacity}-byte receive buffer")]
    Overflow { capacity: usize },

    /// A frame with no content at all.
    #[error("frame has zero length")]
    EmptyFrame,

    /// A frame whose first byte is neither a control nor a payload tag.
    #[error("frame is neither a control message nor a payload (tag 0x{0:02x})")]
    UnknownKind(u8),
}

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The input is not a valid netstring.
    #[error("malformed frame: {0}")]
    Decode(#[from] DecodeError),

    /// The content exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Header text that would not be read back as a control frame.
    #[error("header is not a JSON object")]
    NotControl,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer stopped accepting bytes.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
