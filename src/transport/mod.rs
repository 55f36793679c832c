//! Transport layer.
//!
//! AgentX runs over a stream socket, normally the master agent's Unix
//! domain socket. This module provides the connector with reconnect
//! backoff, length-driven framing on the read side and the single egress
//! writer on the write side.

mod backoff;
mod frame;
mod unix;

pub use backoff::*;
pub use frame::*;
pub use unix::*;

use tokio::io::{AsyncRead, AsyncWrite};

/// Default master agent socket (net-snmp's `agentXSocket` default).
pub const DEFAULT_MASTER_SOCKET: &str = "/var/run/agentx/master";

/// Default cap on a single incoming frame, header included.
///
/// Frames claiming to be larger are rejected before any buffer is allocated.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Any bidirectional byte stream a session can run over.
///
/// Implemented for `UnixStream`, and for `tokio::io::DuplexStream` which the
/// tests use in place of a real master.
pub trait AgentxStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> AgentxStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}
