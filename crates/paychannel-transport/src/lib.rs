//! Unix socket descriptor transport for paychannel.
//!
//! The channel never binds, listens or connects. The host process hands it
//! descriptors that are already open and already connected, and this crate
//! wraps them in [`IpcStream`] after checking that they really are sockets.
//!
//! This is the lowest layer of paychannel. Everything else builds on top of
//! the [`IpcStream`] type provided here.

#![cfg(unix)]

pub mod error;
pub mod stream;

pub use error::{Result, TransportError};
pub use stream::IpcStream;
