//! Duplex notification channel over inherited Unix socket descriptors.
//!
//! Each notification travels as two netstrings: a JSON header whose first
//! byte is `{`, then a payload tagged with `P`. Receive buffering is fixed
//! size and every malformed input is reported to the host, never panicked on.
//!
//! # Crate Structure
//!
//! - [`transport`]: adopting already connected socket descriptors
//! - [`frame`]: netstring codec, receive buffer and frame writer
//! - [`channel`]: notification pairing, listener callbacks and sending

/// Re-export transport types.
pub mod transport {
    pub use paychannel_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use paychannel_frame::*;
}

/// Re-export channel types.
pub mod channel {
    pub use paychannel_channel::*;
}

pub use paychannel_channel::{
    Channel, ChannelConfig, ChannelListener, Condition, EventId, HandlerResult, Notification,
    NotificationHeader, ReadStatus, Sender,
};
