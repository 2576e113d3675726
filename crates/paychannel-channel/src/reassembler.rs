use crate::listener::Condition;
use crate::notification::{Notification, NotificationHeader};

/// Pairs each control frame with the payload frame that follows it.
///
/// At most one header is held. While it is held, further control frames are
/// rejected and the held header is kept.
#[derive(Debug, Default)]
pub struct NotificationReassembler {
    pending: Option<NotificationHeader>,
}

impl NotificationReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&NotificationHeader> {
        self.pending.as_ref()
    }

    /// Accept the JSON text of a control frame.
    pub fn on_control(&mut self, text: &[u8]) -> std::result::Result<(), Condition> {
        if self.pending.is_some() {
            return Err(Condition::NotificationPending);
        }
        self.pending = Some(NotificationHeader::parse(text)?);
        Ok(())
    }

    /// Accept a payload frame and complete the pending notification.
    ///
    /// The pending header is released before the notification is returned,
    /// whatever the caller does with it afterwards.
    pub fn on_payload<'p>(
        &mut self,
        payload: &'p [u8],
    ) -> std::result::Result<Notification<'p>, Condition> {
        let header = self.pending.take().ok_or(Condition::UnpairedPayload)?;
        Ok(Notification::new(header, payload))
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}
