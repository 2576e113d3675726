use std::io::{ErrorKind, Read};

use paychannel_transport::IpcStream;
use tracing::trace;

use crate::codec::{decode_netstring, FrameConfig};
use crate::error::{FrameCondition, FrameError, Result};
use crate::kind::{classify, InboundFrame};

/// Smallest capacity that still holds a one-byte frame (`1:P,`).
const MIN_BUFFER_CAPACITY: usize = 4;

/// One step of the parse loop, handed to the visitor of [`FrameBuffer::drain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent<'a> {
    /// A complete, classified frame. The slice is only valid during the visit.
    Frame(InboundFrame<'a>),
    /// Bytes were dropped.
    Condition(FrameCondition),
}

/// Fixed-capacity receive buffer that reassembles frames from raw reads.
///
/// Bytes in `[0, cursor)` are consumed, bytes in `[cursor, data_len)` are
/// waiting to be parsed, and `cursor <= data_len <= capacity` always holds.
/// Memory use never grows beyond the capacity chosen at construction.
pub struct FrameBuffer {
    buf: Box<[u8]>,
    data_len: usize,
    cursor: usize,
    max_content: usize,
}

impl FrameBuffer {
    /// Create a buffer sized for the default configuration.
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    /// Create a buffer sized and limited by `config`.
    pub fn with_config(config: &FrameConfig) -> Self {
        Self::with_capacity(config.buffer_capacity, config.max_content_len())
    }

    /// Create a buffer with an explicit capacity and netstring content limit.
    pub fn with_capacity(capacity: usize, max_content: usize) -> Self {
        Self {
            buf: vec![0u8; capacity.max(MIN_BUFFER_CAPACITY)].into_boxed_slice(),
            data_len: 0,
            cursor: 0,
            max_content,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of valid bytes, consumed or not.
    pub fn data_len(&self) -> usize {
        self.data_len
    }

    /// Offset of the next unparsed byte.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Bytes received but not yet parsed into a frame.
    pub fn unconsumed(&self) -> &[u8] {
        &self.buf[self.cursor..self.data_len]
    }

    pub fn spare_capacity(&self) -> usize {
        self.buf.len() - self.data_len
    }

    pub fn is_empty(&self) -> bool {
        self.data_len == 0
    }

    /// Drop every buffered byte.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.data_len = 0;
    }

    /// Perform one read from `src` into the spare capacity.
    ///
    /// Returns the number of bytes read; `Ok(0)` means end of stream.
    pub fn read_from<R: Read>(&mut self, src: &mut R) -> std::io::Result<usize> {
        if self.spare_capacity() == 0 {
            return Err(std::io::Error::other(
                "receive buffer full; drain it before reading",
            ));
        }
        loop {
            match src.read(&mut self.buf[self.data_len..]) {
                Ok(n) => {
                    self.data_len += n;
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Copy as much of `chunk` as fits into the spare capacity.
    pub fn fill(&mut self, chunk: &[u8]) -> usize {
        let n = chunk.len().min(self.spare_capacity());
        self.buf[self.data_len..self.data_len + n].copy_from_slice(&chunk[..n]);
        self.data_len += n;
        n
    }

    /// Feed bytes obtained elsewhere, draining after every fill.
    ///
    /// Chunks larger than the spare capacity are split up, so any amount of
    /// input can be pushed through the fixed buffer.
    pub fn push<F>(&mut self, mut bytes: &[u8], mut visit: F)
    where
        F: FnMut(FrameEvent<'_>),
    {
        while !bytes.is_empty() {
            let n = self.fill(bytes);
            bytes = &bytes[n..];
            self.drain(&mut visit);
        }
    }

    /// Parse every complete frame currently buffered.
    ///
    /// Frames and conditions are handed to `visit` in wire order. On return
    /// the buffer always has spare capacity for the next read.
    pub fn drain<F>(&mut self, mut visit: F)
    where
        F: FnMut(FrameEvent<'_>),
    {
        while self.cursor < self.data_len {
            let decoded =
                decode_netstring(&self.buf[self.cursor..self.data_len], self.max_content);
            let frame = match decoded {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    if let Some(condition) = self.make_room() {
                        visit(FrameEvent::Condition(condition));
                    }
                    return;
                }
                Err(err) => {
                    // No resynchronisation inside a corrupt buffer.
                    self.reset();
                    visit(FrameEvent::Condition(FrameCondition::Malformed(err)));
                    return;
                }
            };

            let consumed = frame.wire_len();
            trace!(
                offset = self.cursor,
                len = frame.len(),
                "frame reassembled"
            );
            match classify(frame.content()) {
                Ok(inbound) => visit(FrameEvent::Frame(inbound)),
                Err(condition) => visit(FrameEvent::Condition(condition)),
            }

            self.cursor += consumed;
            if self.cursor == self.data_len {
                self.reset();
            }
        }
    }

    /// Called on an incomplete frame. Compacts a full buffer, or discards it
    /// when the unfinished frame already starts at offset 0.
    fn make_room(&mut self) -> Option<FrameCondition> {
        if self.data_len < self.buf.len() {
            return None;
        }

        if self.cursor != 0 {
            let tail = self.data_len - self.cursor;
            self.buf.copy_within(self.cursor..self.data_len, 0);
            trace!(moved = tail, "compacted receive buffer");
            self.cursor = 0;
            self.data_len = tail;
            None
        } else {
            self.reset();
            Some(FrameCondition::Overflow {
                capacity: self.buf.len(),
            })
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("capacity", &self.buf.len())
            .field("data_len", &self.data_len)
            .field("cursor", &self.cursor)
            .field("max_content", &self.max_content)
            .finish()
    }
}

/// Reads frames from any `Read` stream through a [`FrameBuffer`].
pub struct FrameReader<T> {
    inner: T,
    buffer: FrameBuffer,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buffer: FrameBuffer::with_config(&config),
            config,
        }
    }

    /// Read once from the stream and visit every frame that became complete.
    ///
    /// Returns the number of bytes read. End of stream is reported as
    /// `Err(FrameError::ConnectionClosed)`; `WouldBlock` and timeouts come
    /// back as `FrameError::Io`.
    pub fn read_frames<F>(&mut self, visit: F) -> Result<usize>
    where
        F: FnMut(FrameEvent<'_>),
    {
        let read = self
            .buffer
            .read_from(&mut self.inner)
            .map_err(FrameError::Io)?;
        if read == 0 {
            return Err(FrameError::ConnectionClosed);
        }

        self.buffer.drain(visit);
        Ok(read)
    }

    /// Borrow the receive buffer.
    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Mutably borrow the receive buffer, e.g. to push bytes read elsewhere.
    pub fn buffer_mut(&mut self) -> &mut FrameBuffer {
        &mut self.buffer
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<IpcStream> {
    /// Create a frame reader for `IpcStream` and apply read timeout from config.
    pub fn with_config_ipc(inner: IpcStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: paychannel_transport::TransportError) -> FrameError {
    match err {
        paychannel_transport::TransportError::Io(io)
        | paychannel_transport::TransportError::BadDescriptor { source: io, .. } => {
            FrameError::Io(io)
        }
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
