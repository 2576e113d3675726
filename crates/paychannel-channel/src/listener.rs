use paychannel_frame::FrameCondition;

use crate::notification::Notification;
use crate::sender::Sender;

/// Result returned by listener callbacks.
///
/// An error is logged and does not stop the channel.
pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Inbound data that was dropped instead of delivered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Condition {
    /// The framing layer discarded bytes.
    #[error(transparent)]
    Frame(#[from] FrameCondition),

    /// A control frame was not a valid notification header.
    #[error("invalid control message: {0}")]
    InvalidControl(String),

    /// A control frame named an event outside the event table.
    #[error("unknown event '{0}'")]
    UnknownEvent(String),

    /// A control frame arrived while another was still waiting for its payload.
    #[error("notification already awaiting its payload, control frame discarded")]
    NotificationPending,

    /// A payload frame arrived with no control frame before it.
    #[error("payload without a preceding control frame, discarded")]
    UnpairedPayload,
}

impl Condition {
    /// Short machine-readable name, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Condition::Frame(FrameCondition::Malformed(_)) => "malformed",
            Condition::Frame(FrameCondition::Overflow { .. }) => "overflow",
            Condition::Frame(FrameCondition::EmptyFrame) => "empty_frame",
            Condition::Frame(FrameCondition::UnknownKind(_)) => "unknown_kind",
            Condition::InvalidControl(_) => "invalid_control",
            Condition::UnknownEvent(_) => "unknown_event",
            Condition::NotificationPending => "notification_pending",
            Condition::UnpairedPayload => "unpaired_payload",
        }
    }
}

/// Receives what a [`Channel`](crate::Channel) reads.
///
/// Callbacks run on the thread driving the channel. The sender passed to
/// [`on_notification`](Self::on_notification) writes to the outbound side of
/// the same channel, so a reply can be sent from inside the callback.
pub trait ChannelListener {
    fn on_notification(
        &mut self,
        sender: &mut Sender,
        notification: &Notification<'_>,
    ) -> HandlerResult;

    /// Called for every discarded frame or buffer. Already logged by the channel.
    fn on_malformed_input(&mut self, _condition: &Condition) {}

    /// Called once, when the inbound side reaches end of stream or fails.
    fn on_closed(&mut self) {}
}

impl<L: ChannelListener + ?Sized> ChannelListener for &mut L {
    fn on_notification(
        &mut self,
        sender: &mut Sender,
        notification: &Notification<'_>,
    ) -> HandlerResult {
        (**self).on_notification(sender, notification)
    }

    fn on_malformed_input(&mut self, condition: &Condition) {
        (**self).on_malformed_input(condition)
    }

    fn on_closed(&mut self) {
        (**self).on_closed()
    }
}
