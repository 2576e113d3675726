use std::io::ErrorKind;

use paychannel_frame::{encoded_len, FrameConfig, FrameError, FrameWriter};
use paychannel_transport::IpcStream;
use serde::Serialize;
use tracing::{debug, error, trace};

use crate::error::Result;

/// Outbound half of a channel.
///
/// Once closed, either explicitly or because the peer went away, every send
/// is accepted and dropped.
pub struct Sender {
    writer: Option<FrameWriter<IpcStream>>,
    bytes_written: u64,
}

impl Sender {
    /// Adopt `stream` as the outbound side.
    pub fn new(stream: IpcStream, config: &FrameConfig) -> Result<Self> {
        Ok(Self {
            writer: Some(FrameWriter::with_config_ipc(stream, config.clone())?),
            bytes_written: 0,
        })
    }

    /// A sender with nowhere to write.
    pub fn closed() -> Self {
        Self {
            writer: None,
            bytes_written: 0,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Send `header` as a control frame followed by `payload`.
    ///
    /// `header` must serialize to a JSON object. A header or payload above
    /// the size limit is logged and rejected without writing anything.
    pub fn send<H>(&mut self, header: &H, payload: &[u8]) -> Result<()>
    where
        H: Serialize + ?Sized,
    {
        let text = serde_json::to_vec(header)?;
        self.send_raw(&text, payload)
    }

    /// Send already serialized header text followed by `payload`.
    pub fn send_raw(&mut self, header: &[u8], payload: &[u8]) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            trace!(payload_len = payload.len(), "sender closed, notification dropped");
            return Ok(());
        };

        match writer.write_notification(header, payload) {
            Ok(()) => {
                let written = encoded_len(header.len()) + encoded_len(payload.len() + 1);
                self.bytes_written += written as u64;
                trace!(
                    header_len = header.len(),
                    payload_len = payload.len(),
                    "notification sent"
                );
                Ok(())
            }
            Err(err @ FrameError::PayloadTooLarge { .. }) => {
                error!(error = %err, "notification too big, not sent");
                Err(err.into())
            }
            Err(err) if is_disconnect(&err) => {
                debug!(error = %err, "peer stopped reading, closing sender");
                self.writer = None;
                Err(err.into())
            }
            Err(err) if is_timeout(&err) => {
                error!(error = %err, "write timed out mid-frame, closing sender");
                self.writer = None;
                Err(err.into())
            }
            Err(err) => {
                error!(error = %err, "failed to send notification");
                Err(err.into())
            }
        }
    }

    /// Shut down the outbound side. Idempotent.
    pub fn close(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(err) = writer.get_ref().shutdown_write() {
                debug!(error = %err, "outbound shutdown failed");
            }
        }
    }
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("fd", &self.writer.as_ref().map(|w| w.get_ref().raw_fd()))
            .field("bytes_written", &self.bytes_written)
            .finish()
    }
}

fn is_disconnect(err: &FrameError) -> bool {
    match err {
        FrameError::ConnectionClosed => true,
        FrameError::Io(io) => matches!(
            io.kind(),
            ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::NotConnected
        ),
        _ => false,
    }
}

fn is_timeout(err: &FrameError) -> bool {
    matches!(
        err,
        FrameError::Io(io) if matches!(io.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
    )
}
