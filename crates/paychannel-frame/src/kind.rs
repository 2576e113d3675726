//! Frame kinds.
//!
//! The first content byte of a frame selects its kind. Control frames keep
//! the tag as part of their content because it is the opening brace of the
//! JSON object. Payload frames carry the tag in front of the opaque bytes.

use crate::error::FrameCondition;

/// First byte of a control frame.
pub const CONTROL_TAG: u8 = b'{';

/// First byte of a payload frame.
pub const PAYLOAD_TAG: u8 = b'P';

/// The two kinds of frame the channel exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Structured header carrying a JSON object.
    Control,
    /// Opaque binary block belonging to the preceding control frame.
    Payload,
}

impl FrameKind {
    /// The tag byte that introduces this kind on the wire.
    pub const fn tag(self) -> u8 {
        match self {
            FrameKind::Control => CONTROL_TAG,
            FrameKind::Payload => PAYLOAD_TAG,
        }
    }

    /// Look up the kind for a tag byte.
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            CONTROL_TAG => Some(FrameKind::Control),
            PAYLOAD_TAG => Some(FrameKind::Payload),
            _ => None,
        }
    }

    /// Returns a human-readable name for the kind.
    pub const fn name(self) -> &'static str {
        match self {
            FrameKind::Control => "CONTROL",
            FrameKind::Payload => "PAYLOAD",
        }
    }
}

/// A classified frame, borrowed from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundFrame<'a> {
    /// JSON object text, starting with `{`.
    Control(&'a [u8]),
    /// Payload bytes with the tag already stripped.
    Payload(&'a [u8]),
}

impl InboundFrame<'_> {
    pub fn kind(&self) -> FrameKind {
        match self {
            InboundFrame::Control(_) => FrameKind::Control,
            InboundFrame::Payload(_) => FrameKind::Payload,
        }
    }
}

/// Classify frame content by its leading byte.
pub fn classify(content: &[u8]) -> std::result::Result<InboundFrame<'_>, FrameCondition> {
    let Some((&tag, rest)) = content.split_first() else {
        return Err(FrameCondition::EmptyFrame);
    };

    match FrameKind::from_tag(tag) {
        Some(FrameKind::Control) => Ok(InboundFrame::Control(content)),
        Some(FrameKind::Payload) => Ok(InboundFrame::Payload(rest)),
        None => Err(FrameCondition::UnknownKind(tag)),
    }
}
