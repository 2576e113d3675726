use std::os::fd::RawFd;

/// Errors that can occur in IPC transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The descriptor is not open (or not usable by this process).
    #[error("bad file descriptor {fd}: {source}")]
    BadDescriptor {
        fd: RawFd,
        source: std::io::Error,
    },

    /// The descriptor is open but does not refer to a socket.
    #[error("file descriptor {fd} is not a socket")]
    NotASocket { fd: RawFd },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
