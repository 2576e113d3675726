//! Notification channel between a controller and a worker process.
//!
//! A notification is a control frame carrying a JSON header immediately
//! followed by a payload frame carrying opaque bytes. [`Channel`] reads both
//! halves from the inbound descriptor, pairs them, and hands the result to a
//! [`ChannelListener`]; [`Sender`] writes the same pair to the outbound one.

pub mod channel;
pub mod error;
pub mod event;
pub mod listener;
pub mod notification;
pub mod reassembler;
pub mod sender;

pub use channel::{Channel, ChannelConfig, ChannelStats, ReadStatus};
pub use error::{ChannelError, Result};
pub use event::{EventId, UnknownEvent};
pub use listener::{ChannelListener, Condition, HandlerResult};
pub use notification::{Notification, NotificationHeader};
pub use reassembler::NotificationReassembler;
pub use sender::Sender;
