use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;

use tracing::debug;

use crate::error::{Result, TransportError};

/// A connected Unix socket handed to the channel by its host.
///
/// The stream owns its descriptor and closes it on drop. It never performs
/// bind, listen or connect itself.
pub struct IpcStream {
    inner: UnixStream,
}

impl Read for IpcStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for IpcStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl IpcStream {
    /// Wrap an already connected `UnixStream`.
    pub fn from_unix(stream: UnixStream) -> Self {
        Self { inner: stream }
    }

    /// Adopt an owned descriptor, verifying that it refers to a socket.
    pub fn from_owned_fd(fd: OwnedFd) -> Result<Self> {
        let raw = fd.as_raw_fd();
        ensure_socket(raw)?;
        debug!(fd = raw, "adopted socket descriptor");
        Ok(Self::from_unix(UnixStream::from(fd)))
    }

    /// Adopt a raw descriptor number, e.g. one inherited from a parent process.
    ///
    /// The descriptor is checked for being open before ownership is taken.
    ///
    /// # Safety
    ///
    /// `fd` must not be owned by anything else in this process. After this
    /// call succeeds the returned stream closes it on drop.
    pub unsafe fn from_raw_fd_checked(fd: RawFd) -> Result<Self> {
        // SAFETY: F_GETFD only inspects descriptor flags and has no effect on
        // the descriptor; it fails with EBADF when `fd` is not open.
        let rc = unsafe { libc::fcntl(fd, libc::F_GETFD) };
        if rc == -1 {
            return Err(TransportError::BadDescriptor {
                fd,
                source: std::io::Error::last_os_error(),
            });
        }
        ensure_socket(fd)?;

        // SAFETY: `fd` is open (checked above) and the caller guarantees that
        // no other owner exists.
        let owned = unsafe { OwnedFd::from_raw_fd(fd) };
        debug!(fd, "adopted inherited socket descriptor");
        Ok(Self::from_unix(UnixStream::from(owned)))
    }

    /// Create a connected pair of streams within this process.
    pub fn pair() -> Result<(Self, Self)> {
        let (left, right) = UnixStream::pair()?;
        Ok((Self::from_unix(left), Self::from_unix(right)))
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Switch the descriptor between blocking and non-blocking mode.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.inner.set_nonblocking(nonblocking).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self::from_unix(cloned))
    }

    /// Shut down the write half so the peer observes end of stream.
    ///
    /// A peer that already went away is not an error.
    pub fn shutdown_write(&self) -> Result<()> {
        match self.inner.shutdown(Shutdown::Write) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    /// The raw descriptor number, for logging and readiness registration.
    pub fn raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }

    /// Get the credentials of the connected peer (Linux only).
    ///
    /// Returns `(uid, gid, pid)` via `SO_PEERCRED`, or `None` if unavailable.
    #[cfg(target_os = "linux")]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        let fd = self.inner.as_raw_fd();

        let mut cred = libc::ucred {
            pid: 0,
            uid: 0,
            gid: 0,
        };
        let mut len = std::mem::size_of::<libc::ucred>() as libc::socklen_t;

        // SAFETY: `cred` and `len` are valid writable pointers for the provided sizes,
        // and `fd` is an open Unix socket descriptor owned by this stream.
        let rc = unsafe {
            libc::getsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_PEERCRED,
                (&mut cred as *mut libc::ucred).cast::<libc::c_void>(),
                &mut len,
            )
        };

        if rc == 0 && len as usize == std::mem::size_of::<libc::ucred>() {
            Some((cred.uid, cred.gid, cred.pid as u32))
        } else {
            None
        }
    }

    /// Get the credentials of the connected peer.
    ///
    /// Returns `None` on platforms that do not expose peer credentials.
    #[cfg(not(target_os = "linux"))]
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        None
    }
}

impl AsRawFd for IpcStream {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

impl AsFd for IpcStream {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.as_fd()
    }
}

impl std::fmt::Debug for IpcStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcStream")
            .field("fd", &self.inner.as_raw_fd())
            .finish()
    }
}

fn ensure_socket(fd: RawFd) -> Result<()> {
    let mut stat = std::mem::MaybeUninit::<libc::stat>::uninit();

    // SAFETY: `stat` points to writable memory large enough for `libc::stat`;
    // fstat fails with EBADF instead of touching it when `fd` is not open.
    let rc = unsafe { libc::fstat(fd, stat.as_mut_ptr()) };
    if rc != 0 {
        return Err(TransportError::BadDescriptor {
            fd,
            source: std::io::Error::last_os_error(),
        });
    }

    // SAFETY: fstat returned 0, so the structure has been filled in.
    let stat = unsafe { stat.assume_init() };
    if stat.st_mode & libc::S_IFMT != libc::S_IFSOCK {
        return Err(TransportError::NotASocket { fd });
    }
    Ok(())
}
