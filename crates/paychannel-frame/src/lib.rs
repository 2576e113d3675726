//! Netstring framing for the paychannel wire protocol.
//!
//! Every frame on the wire is a netstring, `<decimal length>:<bytes>,`, and
//! the first content byte says what the frame carries:
//! - `{` for a control frame (the whole content is a JSON object)
//! - `P` for a payload frame (the rest of the content is opaque bytes)
//!
//! Inbound bytes go through a single fixed-capacity [`FrameBuffer`] and
//! outbound frames through one reusable scratch buffer in [`FrameWriter`].

pub mod codec;
pub mod error;
pub mod kind;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::NetstringCodec;
pub use codec::{
    decode_netstring, encode_control_frame, encode_netstring, encode_payload_frame, encoded_len,
    Frame, FrameConfig, DEFAULT_BUFFER_CAPACITY, MAX_CONTENT_LEN, MAX_PAYLOAD_LEN,
};
pub use error::{DecodeError, FrameCondition, FrameError, Result};
pub use kind::{classify, FrameKind, InboundFrame, CONTROL_TAG, PAYLOAD_TAG};
pub use reader::{FrameBuffer, FrameEvent, FrameReader};
pub use writer::FrameWriter;
