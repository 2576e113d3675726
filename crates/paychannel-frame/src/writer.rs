use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use paychannel_transport::IpcStream;

use crate::codec::{encode_control_frame, encode_payload_frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::kind::CONTROL_TAG;
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes netstring frames to any `Write` stream.
///
/// One scratch buffer is owned per writer and reused for every frame, so its
/// capacity settles at the largest frame sent.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a header and its payload as two back-to-back frames.
    ///
    /// Both limits and the header shape are checked before anything is
    /// written, so a rejected call leaves the stream untouched.
    pub fn write_notification(&mut self, header: &[u8], payload: &[u8]) -> Result<()> {
        let max = self.config.max_payload_size;
        if header.first() != Some(&CONTROL_TAG) {
            return Err(FrameError::NotControl);
        }
        if header.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: header.len(),
                max,
            });
        }
        if payload.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max,
            });
        }

        self.write_control(header)?;
        self.write_payload(payload)
    }

    /// Encode and send header JSON text as a control frame.
    pub fn write_control(&mut self, header: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_control_frame(header, self.config.max_payload_size, &mut self.buf)?;
        self.write_buffered()
    }

    /// Encode and send binary data as a payload frame.
    pub fn write_payload(&mut self, payload: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_payload_frame(payload, self.config.max_payload_size, &mut self.buf)?;
        self.write_buffered()
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if self.should_retry(&err) => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if self.should_retry(&err) => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// With a write timeout set, `WouldBlock` means the timeout expired.
    fn should_retry(&self, err: &std::io::Error) -> bool {
        match err.kind() {
            ErrorKind::Interrupted => true,
            ErrorKind::WouldBlock => self.config.write_timeout.is_none(),
            _ => false,
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<IpcStream> {
    /// Create a frame writer for `IpcStream` and apply write timeout from config.
    pub fn with_config_ipc(inner: IpcStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}
