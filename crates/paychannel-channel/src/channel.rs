use std::io::ErrorKind;

use paychannel_frame::{
    FrameBuffer, FrameConfig, FrameError, FrameEvent, FrameReader, InboundFrame,
};
use paychannel_transport::IpcStream;
use serde::Serialize;
use tracing::{debug, error, trace, warn};

use crate::error::Result;
use crate::listener::{ChannelListener, Condition};
use crate::reassembler::NotificationReassembler;
use crate::sender::Sender;

/// Configuration for one channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelConfig {
    pub frame: FrameConfig,
    /// Put the inbound descriptor in non-blocking mode, for hosts that poll it.
    pub nonblocking: bool,
}

/// Outcome of one [`Channel::on_readable`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// This many bytes were read and every complete frame was dispatched.
    Data(usize),
    /// Nothing to read yet, or the read timeout expired.
    WouldBlock,
    /// The inbound side is closed. No further callbacks will be made.
    Closed,
}

/// Counters kept by a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Complete control and payload frames read.
    pub frames: u64,
    /// Notifications delivered to the listener.
    pub notifications: u64,
    /// Conditions reported to the listener.
    pub conditions: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

/// Duplex notification channel over two adopted descriptors.
pub struct Channel {
    inbound: Option<FrameReader<IpcStream>>,
    reassembler: NotificationReassembler,
    sender: Sender,
    stats: ChannelStats,
}

impl Channel {
    /// Open a channel with the default configuration.
    pub fn new(consumer: IpcStream, producer: IpcStream) -> Result<Self> {
        Self::with_config(consumer, producer, ChannelConfig::default())
    }

    /// Open a channel reading from `consumer` and writing to `producer`.
    pub fn with_config(
        consumer: IpcStream,
        producer: IpcStream,
        config: ChannelConfig,
    ) -> Result<Self> {
        let sender = Sender::new(producer, &config.frame)?;
        Self::open(consumer, sender, config)
    }

    /// Open a channel with no outbound side. Every send is dropped.
    pub fn receive_only(consumer: IpcStream, config: ChannelConfig) -> Result<Self> {
        Self::open(consumer, Sender::closed(), config)
    }

    fn open(consumer: IpcStream, sender: Sender, config: ChannelConfig) -> Result<Self> {
        consumer.set_nonblocking(config.nonblocking)?;
        let consumer_fd = consumer.raw_fd();
        let reader = FrameReader::with_config_ipc(consumer, config.frame)?;

        debug!(
            consumer_fd,
            capacity = reader.buffer().capacity(),
            receive_only = sender.is_closed(),
            "channel open"
        );

        Ok(Self {
            inbound: Some(reader),
            reassembler: NotificationReassembler::new(),
            sender,
            stats: ChannelStats::default(),
        })
    }

    /// Read once from the inbound descriptor and dispatch every complete frame.
    ///
    /// End of stream and read failures close the channel and invoke
    /// [`ChannelListener::on_closed`] once.
    pub fn on_readable<L>(&mut self, listener: &mut L) -> Result<ReadStatus>
    where
        L: ChannelListener + ?Sized,
    {
        let Channel {
            inbound,
            reassembler,
            sender,
            stats,
        } = &mut *self;
        let Some(reader) = inbound.as_mut() else {
            return Ok(ReadStatus::Closed);
        };

        let mut router = Router {
            reassembler,
            sender,
            stats,
            listener: &mut *listener,
        };
        let result = reader.read_frames(|event| router.route(event));

        match result {
            Ok(read) => {
                self.stats.bytes_read += read as u64;
                trace!(read, "inbound data");
                Ok(ReadStatus::Data(read))
            }
            Err(FrameError::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                Ok(ReadStatus::WouldBlock)
            }
            Err(FrameError::ConnectionClosed) => {
                debug!("peer closed the inbound side");
                self.terminate(listener);
                Ok(ReadStatus::Closed)
            }
            Err(err) => {
                error!(error = %err, "read failed, closing channel");
                self.terminate(listener);
                Ok(ReadStatus::Closed)
            }
        }
    }

    /// Dispatch bytes that were read by the host instead of the channel.
    pub fn feed<L>(&mut self, bytes: &[u8], listener: &mut L) -> ReadStatus
    where
        L: ChannelListener + ?Sized,
    {
        let Channel {
            inbound,
            reassembler,
            sender,
            stats,
        } = self;
        let Some(reader) = inbound.as_mut() else {
            return ReadStatus::Closed;
        };

        stats.bytes_read += bytes.len() as u64;
        let mut router = Router {
            reassembler,
            sender,
            stats,
            listener,
        };
        reader.buffer_mut().push(bytes, |event| router.route(event));
        ReadStatus::Data(bytes.len())
    }

    /// Read and dispatch until the inbound side closes.
    ///
    /// Meant for blocking descriptors; a non-blocking one makes this spin.
    pub fn run<L>(&mut self, listener: &mut L) -> Result<()>
    where
        L: ChannelListener + ?Sized,
    {
        self.run_until(listener, || true)
    }

    /// Read and dispatch until the inbound side closes or `keep_running`
    /// returns `false`. The predicate is checked before every read, so a read
    /// timeout bounds how long a stop request waits.
    pub fn run_until<L, F>(&mut self, listener: &mut L, mut keep_running: F) -> Result<()>
    where
        L: ChannelListener + ?Sized,
        F: FnMut() -> bool,
    {
        while keep_running() {
            if self.on_readable(listener)? == ReadStatus::Closed {
                break;
            }
        }
        Ok(())
    }

    /// Send a notification on the outbound side.
    pub fn send<H>(&mut self, header: &H, payload: &[u8]) -> Result<()>
    where
        H: Serialize + ?Sized,
    {
        self.sender.send(header, payload)
    }

    pub fn sender(&mut self) -> &mut Sender {
        &mut self.sender
    }

    /// Whether the inbound side has been closed.
    pub fn is_closed(&self) -> bool {
        self.inbound.is_none()
    }

    /// Close both sides without notifying a listener. Idempotent.
    pub fn close(&mut self) {
        if self.inbound.take().is_some() {
            debug!(stats = ?self.stats(), "channel closed");
        }
        self.reassembler.clear();
        self.sender.close();
    }

    /// The receive buffer, while the inbound side is open.
    pub fn buffer(&self) -> Option<&FrameBuffer> {
        self.inbound.as_ref().map(FrameReader::buffer)
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            bytes_written: self.sender.bytes_written(),
            ..self.stats
        }
    }

    fn terminate<L>(&mut self, listener: &mut L)
    where
        L: ChannelListener + ?Sized,
    {
        if self.inbound.is_none() {
            return;
        }
        self.close();
        listener.on_closed();
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("inbound", &self.inbound.as_ref().map(|r| r.get_ref().raw_fd()))
            .field("pending", &self.reassembler.is_pending())
            .field("sender", &self.sender)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Routes frame events from the receive buffer to the listener.
struct Router<'a, L: ?Sized> {
    reassembler: &'a mut NotificationReassembler,
    sender: &'a mut Sender,
    stats: &'a mut ChannelStats,
    listener: &'a mut L,
}

impl<L: ChannelListener + ?Sized> Router<'_, L> {
    fn route(&mut self, event: FrameEvent<'_>) {
        match event {
            FrameEvent::Condition(condition) => self.report(condition.into()),
            FrameEvent::Frame(InboundFrame::Control(text)) => {
                self.stats.frames += 1;
                trace!(len = text.len(), "control frame");
                if let Err(condition) = self.reassembler.on_control(text) {
                    self.report(condition);
                }
            }
            FrameEvent::Frame(InboundFrame::Payload(payload)) => {
                self.stats.frames += 1;
                trace!(len = payload.len(), "payload frame");
                match self.reassembler.on_payload(payload) {
                    Ok(notification) => {
                        self.stats.notifications += 1;
                        let result = self.listener.on_notification(self.sender, &notification);
                        if let Err(err) = result {
                            warn!(
                                event = %notification.event(),
                                error = %err,
                                "notification handler failed"
                            );
                        }
                    }
                    Err(condition) => self.report(condition),
                }
            }
        }
    }

    fn report(&mut self, condition: Condition) {
        self.stats.conditions += 1;
        error!(kind = condition.kind(), "{condition}");
        self.listener.on_malformed_input(&condition);
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::time::Duration;

    use paychannel_frame::{DecodeError, FrameCondition};
    use serde_json::{json, Map, Value};

    use super::*;
    use crate::event::EventId;
    use crate::listener::HandlerResult;
    use crate::notification::{Notification, NotificationHeader};

    const HEADER: &str = r#"{"event":"dataProducer.send","internal":{"id":"dp1"},"data":{"n":1}}"#;

    #[derive(Debug, PartialEq)]
    struct Delivered {
        event: EventId,
        internal: Map<String, Value>,
        data: Map<String, Value>,
        payload: Vec<u8>,
    }

    #[derive(Default)]
    struct Recorder {
        delivered: Vec<Delivered>,
        conditions: Vec<Condition>,
        closed: usize,
        fail: bool,
        echo: bool,
    }

    impl ChannelListener for Recorder {
        fn on_notification(
            &mut self,
            sender: &mut Sender,
            notification: &Notification<'_>,
        ) -> HandlerResult {
            self.delivered.push(Delivered {
                event: notification.event(),
                internal: notification.internal().clone(),
                data: notification.data().clone(),
                payload: notification.payload().to_vec(),
            });
            if self.echo {
                sender.send(notification.header(), notification.payload())?;
            }
            if self.fail {
                return Err("handler refused".into());
            }
            Ok(())
        }

        fn on_malformed_input(&mut self, condition: &Condition) {
            self.conditions.push(condition.clone());
        }

        fn on_closed(&mut self) {
            self.closed += 1;
        }
    }

    fn netstring(content: &[u8]) -> Vec<u8> {
        let mut out = format!("{}:", content.len()).into_bytes();
        out.extend_from_slice(content);
        out.push(b',');
        out
    }

    fn notification_bytes(header: &str, payload: &[u8]) -> Vec<u8> {
        let mut out = netstring(header.as_bytes());
        let mut tagged = vec![b'P'];
        tagged.extend_from_slice(payload);
        out.extend_from_slice(&netstring(&tagged));
        out
    }

    /// Channel plus the peer's write end (our inbound) and read end (our outbound).
    fn open(config: ChannelConfig) -> (Channel, IpcStream, IpcStream) {
        let (consumer, peer_writer) = IpcStream::pair().unwrap();
        let (producer, peer_reader) = IpcStream::pair().unwrap();
        let channel = Channel::with_config(consumer, producer, config).unwrap();
        (channel, peer_writer, peer_reader)
    }

    #[test]
    fn delivers_paired_notification() {
        let (mut channel, mut peer, _out) = open(ChannelConfig::default());
        let mut recorder = Recorder::default();

        peer.write_all(&notification_bytes(HEADER, b"\x00\x01\x02"))
            .unwrap();
        let status = channel.on_readable(&mut recorder).unwrap();

        assert!(matches!(status, ReadStatus::Data(_)));
        assert_eq!(recorder.delivered.len(), 1);
        let delivered = &recorder.delivered[0];
        assert_eq!(delivered.event, EventId::DataProducerSend);
        assert_eq!(delivered.internal["id"], json!("dp1"));
        assert_eq!(delivered.data["n"], json!(1));
        assert_eq!(delivered.payload, vec![0, 1, 2]);
        assert!(recorder.conditions.is_empty());
    }

    #[test]
    fn empty_payload_is_delivered() {
        let (mut channel, _peer, _out) = open(ChannelConfig::default());
        let mut recorder = Recorder::default();

        channel.feed(&notification_bytes(HEADER, b""), &mut recorder);
        assert_eq!(recorder.delivered.len(), 1);
        assert!(recorder.delivered[0].payload.is_empty());
    }

    #[test]
    fn byte_by_byte_feed_delivers_once() {
        let (mut channel, _peer, _out) = open(ChannelConfig::default());
        let mut recorder = Recorder::default();

        let wire = notification_bytes(HEADER, b"abc");
        for byte in &wire {
            channel.feed(std::slice::from_ref(byte), &mut recorder);
        }

        assert_eq!(recorder.delivered.len(), 1);
        assert_eq!(recorder.delivered[0].payload, b"abc");
        assert_eq!(channel.stats().bytes_read, wire.len() as u64);
        assert!(channel.buffer().unwrap().is_empty());
    }

    #[test]
    fn lone_payload_reports_unpaired() {
        let (mut channel, _peer, _out) = open(ChannelConfig::default());
        let mut recorder = Recorder::default();

        channel.feed(&netstring(b"Pxyz"), &mut recorder);
        assert!(recorder.delivered.is_empty());
        assert_eq!(recorder.conditions, vec![Condition::UnpairedPayload]);
    }

    #[test]
    fn second_control_is_dropped_and_first_pairs() {
        let (mut channel, _peer, _out) = open(ChannelConfig::default());
        let mut recorder = Recorder::default();

        let mut wire = netstring(HEADER.as_bytes());
        wire.extend_from_slice(&notification_bytes(
            r#"{"event":"dataProducer.send","data":{"n":2}}"#,
            b"p",
        ));
        channel.feed(&wire, &mut recorder);

        assert_eq!(recorder.conditions, vec![Condition::NotificationPending]);
        assert_eq!(recorder.delivered.len(), 1);
        assert_eq!(recorder.delivered[0].data["n"], json!(1));
        assert_eq!(recorder.delivered[0].payload, b"p");
    }

    #[test]
    fn bad_headers_leave_payload_unpaired() {
        let (mut channel, _peer, _out) = open(ChannelConfig::default());
        let mut recorder = Recorder::default();

        let mut wire = notification_bytes(r#"{"event":"worker.dump"}"#, b"1");
        wire.extend_from_slice(&notification_bytes("{oops", b"2"));
        channel.feed(&wire, &mut recorder);

        assert!(recorder.delivered.is_empty());
        assert_eq!(recorder.conditions.len(), 4);
        assert_eq!(
            recorder.conditions[0],
            Condition::UnknownEvent("worker.dump".to_string())
        );
        assert_eq!(recorder.conditions[1], Condition::UnpairedPayload);
        assert!(matches!(recorder.conditions[2], Condition::InvalidControl(_)));
        assert_eq!(recorder.conditions[3], Condition::UnpairedPayload);
    }

    #[test]
    fn frame_conditions_reach_listener() {
        let (mut channel, _peer, _out) = open(ChannelConfig::default());
        let mut recorder = Recorder::default();

        channel.feed(b"0:,", &mut recorder);
        channel.feed(b"3:abc,", &mut recorder);
        channel.feed(b"03:abc,", &mut recorder);

        assert_eq!(
            recorder.conditions,
            vec![
                Condition::Frame(FrameCondition::EmptyFrame),
                Condition::Frame(FrameCondition::UnknownKind(b'a')),
                Condition::Frame(FrameCondition::Malformed(DecodeError::LeadingZero)),
            ]
        );

        channel.feed(&notification_bytes(HEADER, b"ok"), &mut recorder);
        assert_eq!(recorder.delivered.len(), 1);
        assert_eq!(channel.stats().conditions, 3);
    }

    #[test]
    fn overflow_discards_and_recovers() {
        let config = ChannelConfig {
            frame: FrameConfig {
                buffer_capacity: 64,
                max_payload_size: 1024,
                ..FrameConfig::default()
            },
            ..ChannelConfig::default()
        };
        let (mut channel, _peer, _out) = open(config);
        let mut recorder = Recorder::default();

        let mut big = b"100:P".to_vec();
        big.extend_from_slice(&[b'x'; 59]);
        channel.feed(&big, &mut recorder);
        assert_eq!(
            recorder.conditions,
            vec![Condition::Frame(FrameCondition::Overflow { capacity: 64 })]
        );

        channel.feed(
            &notification_bytes(r#"{"event":"dataProducer.send"}"#, b""),
            &mut recorder,
        );
        assert_eq!(recorder.delivered.len(), 1);
    }

    #[test]
    fn handler_error_does_not_stop_dispatch() {
        let (mut channel, _peer, _out) = open(ChannelConfig::default());
        let mut recorder = Recorder {
            fail: true,
            ..Recorder::default()
        };

        let mut wire = notification_bytes(HEADER, b"1");
        wire.extend_from_slice(&notification_bytes(HEADER, b"2"));
        channel.feed(&wire, &mut recorder);

        assert_eq!(recorder.delivered.len(), 2);
        assert!(recorder.conditions.is_empty());
        assert_eq!(channel.stats().notifications, 2);
    }

    #[test]
    fn listener_can_reply_from_callback() {
        let (mut channel, mut peer, mut out) = open(ChannelConfig::default());
        let mut recorder = Recorder {
            echo: true,
            ..Recorder::default()
        };

        peer.write_all(&notification_bytes(HEADER, b"ping")).unwrap();
        channel.on_readable(&mut recorder).unwrap();
        let written = channel.stats().bytes_written;
        drop(channel);

        let header = NotificationHeader::parse(HEADER.as_bytes()).unwrap();
        let text = serde_json::to_string(&header).unwrap();
        let expected = notification_bytes(&text, b"ping");

        let mut echoed = Vec::new();
        out.read_to_end(&mut echoed).unwrap();
        assert_eq!(echoed, expected);
        assert_eq!(written, expected.len() as u64);
    }

    #[test]
    fn send_writes_scenario_bytes() {
        let (mut channel, _peer, mut out) = open(ChannelConfig::default());
        let header = json!({"event": "datasend", "data": {"x": 1}});

        channel.send(&header, &[1, 2, 3]).unwrap();
        drop(channel);

        let text = serde_json::to_vec(&header).unwrap();
        let mut expected = netstring(&text);
        expected.extend_from_slice(b"4:P\x01\x02\x03,");

        let mut sent = Vec::new();
        out.read_to_end(&mut sent).unwrap();
        assert_eq!(sent, expected);
    }

    #[test]
    fn peer_close_notifies_once_and_closes_sender() {
        let (mut channel, peer, mut out) = open(ChannelConfig::default());
        let mut recorder = Recorder::default();
        drop(peer);

        assert_eq!(channel.on_readable(&mut recorder).unwrap(), ReadStatus::Closed);
        assert_eq!(channel.on_readable(&mut recorder).unwrap(), ReadStatus::Closed);
        assert_eq!(recorder.closed, 1);
        assert!(channel.is_closed());
        assert!(channel.sender().is_closed());
        assert!(channel.buffer().is_none());

        channel.send(&json!({"event": "datasend"}), b"late").unwrap();
        assert_eq!(channel.feed(b"1:P,", &mut recorder), ReadStatus::Closed);

        let mut sent = Vec::new();
        out.read_to_end(&mut sent).unwrap();
        assert!(sent.is_empty());
    }

    #[test]
    fn close_on_pending_header_drops_it() {
        let (mut channel, peer, _out) = open(ChannelConfig::default());
        let mut recorder = Recorder::default();

        channel.feed(&netstring(HEADER.as_bytes()), &mut recorder);
        drop(peer);

        channel.run(&mut recorder).unwrap();
        assert!(recorder.delivered.is_empty());
        assert!(recorder.conditions.is_empty());
        assert_eq!(recorder.closed, 1);
        assert_eq!(channel.stats().frames, 1);
    }

    #[test]
    fn nonblocking_read_reports_would_block() {
        let config = ChannelConfig {
            nonblocking: true,
            ..ChannelConfig::default()
        };
        let (mut channel, _peer, _out) = open(config);
        let mut recorder = Recorder::default();

        assert_eq!(
            channel.on_readable(&mut recorder).unwrap(),
            ReadStatus::WouldBlock
        );
    }

    #[test]
    fn run_until_stops_on_predicate() {
        let config = ChannelConfig {
            frame: FrameConfig {
                read_timeout: Some(Duration::from_millis(20)),
                ..FrameConfig::default()
            },
            ..ChannelConfig::default()
        };
        let (mut channel, mut peer, _out) = open(config);
        let mut recorder = Recorder::default();

        peer.write_all(&notification_bytes(HEADER, b"1")).unwrap();
        let mut polls = 0;
        channel
            .run_until(&mut recorder, || {
                polls += 1;
                polls <= 3
            })
            .unwrap();

        assert_eq!(recorder.delivered.len(), 1);
        assert_eq!(recorder.closed, 0);
        assert!(!channel.is_closed());
    }

    #[test]
    fn receive_only_drops_sends() {
        let (consumer, _peer) = IpcStream::pair().unwrap();
        let mut channel = Channel::receive_only(consumer, ChannelConfig::default()).unwrap();

        assert!(channel.sender().is_closed());
        channel
            .send(&NotificationHeader::new(EventId::DataProducerSend), b"x")
            .unwrap();
        assert_eq!(channel.stats().bytes_written, 0);
    }

    #[test]
    fn stats_count_frames() {
        let (mut channel, _peer, _out) = open(ChannelConfig::default());
        let mut recorder = Recorder::default();

        let mut wire = notification_bytes(HEADER, b"a");
        wire.extend_from_slice(&netstring(b"Pb"));
        channel.feed(&wire, &mut recorder);

        let stats = channel.stats();
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.notifications, 1);
        assert_eq!(stats.conditions, 1);
        assert_eq!(stats.bytes_read, wire.len() as u64);
    }
}
