use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::event::EventId;
use crate::listener::Condition;

/// Header of a notification, carried as the JSON object of a control frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationHeader {
    pub event: EventId,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub internal: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

/// Control frame as it appears on the wire, before the event is resolved.
#[derive(Deserialize)]
struct WireHeader {
    event: String,
    #[serde(default)]
    internal: Option<Map<String, Value>>,
    #[serde(default)]
    data: Option<Map<String, Value>>,
}

impl NotificationHeader {
    /// Create a header with empty `internal` and `data` objects.
    pub fn new(event: EventId) -> Self {
        Self {
            event,
            internal: Map::new(),
            data: Map::new(),
        }
    }

    pub fn with_internal(mut self, internal: Map<String, Value>) -> Self {
        self.internal = internal;
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Parse the JSON text of a control frame.
    ///
    /// `internal` and `data` are optional and must be objects when present.
    /// The event must resolve through the event table.
    pub fn parse(text: &[u8]) -> std::result::Result<Self, Condition> {
        let wire: WireHeader = serde_json::from_slice(text)
            .map_err(|err| Condition::InvalidControl(err.to_string()))?;
        let event = wire
            .event
            .parse::<EventId>()
            .map_err(|err| Condition::UnknownEvent(err.0))?;

        Ok(Self {
            event,
            internal: wire.internal.unwrap_or_default(),
            data: wire.data.unwrap_or_default(),
        })
    }
}

/// A header paired with the payload that followed it.
///
/// The payload borrows the receive buffer and is only valid for the duration
/// of the listener callback; copy it with `to_vec()` to keep it.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification<'a> {
    header: NotificationHeader,
    payload: &'a [u8],
}

impl<'a> Notification<'a> {
    pub fn new(header: NotificationHeader, payload: &'a [u8]) -> Self {
        Self { header, payload }
    }

    pub fn event(&self) -> EventId {
        self.header.event
    }

    pub fn internal(&self) -> &Map<String, Value> {
        &self.header.internal
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.header.data
    }

    pub fn header(&self) -> &NotificationHeader {
        &self.header
    }

    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Split into the owned header and the borrowed payload.
    pub fn into_parts(self) -> (NotificationHeader, &'a [u8]) {
        (self.header, self.payload)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_full_header() {
        let header = NotificationHeader::parse(
            br#"{"event":"dataProducer.send","internal":{"dataProducerId":"dp1"},"data":{"ppid":51}}"#,
        )
        .unwrap();

        assert_eq!(header.event, EventId::DataProducerSend);
        assert_eq!(header.internal["dataProducerId"], json!("dp1"));
        assert_eq!(header.data["ppid"], json!(51));
    }

    #[test]
    fn internal_and_data_default_to_empty() {
        let header = NotificationHeader::parse(br#"{"event":"dataProducer.send"}"#).unwrap();
        assert!(header.internal.is_empty());
        assert!(header.data.is_empty());

        let header =
            NotificationHeader::parse(br#"{"event":"dataProducer.send","data":null}"#).unwrap();
        assert!(header.data.is_empty());
    }

    #[test]
    fn rejects_invalid_json() {
        let err = NotificationHeader::parse(b"{oops").unwrap_err();
        assert!(matches!(err, Condition::InvalidControl(_)));
    }

    #[test]
    fn rejects_missing_event_and_non_object_fields() {
        assert!(matches!(
            NotificationHeader::parse(br#"{"data":{}}"#),
            Err(Condition::InvalidControl(_))
        ));
        assert!(matches!(
            NotificationHeader::parse(br#"{"event":"dataProducer.send","data":[1]}"#),
            Err(Condition::InvalidControl(_))
        ));
        assert!(matches!(
            NotificationHeader::parse(br#"{"event":7}"#),
            Err(Condition::InvalidControl(_))
        ));
    }

    #[test]
    fn rejects_unknown_event() {
        let err = NotificationHeader::parse(br#"{"event":"worker.dump"}"#).unwrap_err();
        assert_eq!(err, Condition::UnknownEvent("worker.dump".to_string()));
    }

    #[test]
    fn serializes_without_empty_objects() {
        let header = NotificationHeader::new(EventId::DataProducerSend);
        assert_eq!(
            serde_json::to_string(&header).unwrap(),
            r#"{"event":"dataProducer.send"}"#
        );

        let mut data = Map::new();
        data.insert("ppid".to_string(), json!(53));
        let header = header.with_data(data);
        let text = serde_json::to_vec(&header).unwrap();
        assert_eq!(NotificationHeader::parse(&text).unwrap(), header);
    }

    #[test]
    fn notification_exposes_parts() {
        let header = NotificationHeader::new(EventId::DataProducerSend);
        let notification = Notification::new(header.clone(), b"abc");

        assert_eq!(notification.event(), EventId::DataProducerSend);
        assert_eq!(notification.payload(), b"abc");
        assert_eq!(notification.payload_len(), 3);
        assert_eq!(notification.into_parts(), (header, &b"abc"[..]));
    }
}
