//! Session configuration.

use std::path::PathBuf;
use std::time::Duration;

use tracing::instrument;

use crate::codec::{ByteOrder, HEADER_LEN};
use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::registry::DEFAULT_PRIORITY;
use crate::transport::{
    AgentxStream, DEFAULT_MASTER_SOCKET, DEFAULT_MAX_FRAME_SIZE, Reconnect, connect_unix,
};

use super::Session;

/// Ping interval used when the session timeout is zero.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(5);

/// Request timeout used when the session timeout is zero.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings a session runs with, fixed at open.
#[derive(Debug, Clone)]
pub(crate) struct SessionConfig {
    pub socket_path: PathBuf,
    pub id: Oid,
    pub description: String,
    /// Announced in the Open PDU; 0 leaves it to the master.
    pub timeout: Duration,
    /// How long our own requests wait for the master.
    pub request_timeout: Duration,
    pub ping_interval: Duration,
    pub max_missed_pings: u32,
    pub byte_order: ByteOrder,
    pub default_priority: u8,
    pub max_frame_size: usize,
}

impl SessionConfig {
    /// The Open PDU's timeout field, whole seconds.
    pub(crate) fn timeout_secs(&self) -> u8 {
        u8::try_from(self.timeout.as_secs()).unwrap_or(u8::MAX)
    }
}

/// Builder for an AgentX [`Session`].
///
/// # Example
///
/// ```rust,no_run
/// use async_agentx::session::SessionBuilder;
/// use std::time::Duration;
///
/// # async fn example() -> async_agentx::Result<()> {
/// let session = SessionBuilder::new()
///     .socket_path("/var/agentx/master")
///     .description("rack monitor")
///     .timeout(Duration::from_secs(10))
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    socket_path: PathBuf,
    id: Oid,
    description: Option<String>,
    timeout: Duration,
    ping_interval: Option<Duration>,
    max_missed_pings: u32,
    reconnect: Reconnect,
    byte_order: ByteOrder,
    default_priority: u8,
    max_frame_size: usize,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_MASTER_SOCKET),
            id: Oid::empty(),
            description: None,
            timeout: Duration::from_secs(5),
            ping_interval: None,
            max_missed_pings: 3,
            reconnect: Reconnect::default(),
            byte_order: ByteOrder::Network,
            default_priority: DEFAULT_PRIORITY,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Master agent socket (default `/var/run/agentx/master`).
    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    /// Subagent identifier sent in the Open PDU, the null OID by default.
    pub fn id(mut self, id: Oid) -> Self {
        self.id = id;
        self
    }

    /// Human-readable subagent name (default: the program name).
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Session timeout announced to the master and used for our own
    /// requests (default 5s, at most 255s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Interval between keepalive pings (default: a third of the timeout).
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = Some(interval);
        self
    }

    /// Consecutive unanswered pings after which the session is lost
    /// (default 3).
    pub fn max_missed_pings(mut self, count: u32) -> Self {
        self.max_missed_pings = count;
        self
    }

    /// Retry policy for connecting to the socket.
    pub fn reconnect(mut self, reconnect: impl Into<Reconnect>) -> Self {
        self.reconnect = reconnect.into();
        self
    }

    /// Byte order of the PDUs we send (default network order).
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    /// Priority for `register_scalar`, `register_table` and
    /// `register_subtree` (default 127).
    pub fn default_priority(mut self, priority: u8) -> Self {
        self.default_priority = priority;
        self
    }

    /// Largest frame accepted from the master, header included.
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    pub(crate) fn build_config(&self) -> Result<SessionConfig> {
        if self.timeout.as_secs() > u64::from(u8::MAX) {
            return Err(Error::Config(
                format!("timeout {:?} exceeds 255 seconds", self.timeout).into(),
            ));
        }
        if self.max_missed_pings == 0 {
            return Err(Error::Config("max_missed_pings must be at least 1".into()));
        }
        if self.max_frame_size < HEADER_LEN {
            return Err(Error::Config(
                format!("max_frame_size must be at least {} bytes", HEADER_LEN).into(),
            ));
        }
        if self.ping_interval.is_some_and(|i| i.is_zero()) {
            return Err(Error::Config("ping_interval must be non-zero".into()));
        }
        self.id.validate_length()?;

        let ping_interval = match self.ping_interval {
            Some(interval) => interval,
            None if self.timeout.as_secs() == 0 => DEFAULT_PING_INTERVAL,
            None => self.timeout / 3,
        };

        Ok(SessionConfig {
            socket_path: self.socket_path.clone(),
            id: self.id.clone(),
            description: self.description.clone().unwrap_or_else(program_name),
            timeout: self.timeout,
            request_timeout: if self.timeout.is_zero() {
                DEFAULT_REQUEST_TIMEOUT
            } else {
                self.timeout
            },
            ping_interval,
            max_missed_pings: self.max_missed_pings,
            byte_order: self.byte_order,
            default_priority: self.default_priority,
            max_frame_size: self.max_frame_size,
        })
    }

    /// Connect to the master socket and open a session.
    #[instrument(skip_all, err, fields(agentx.socket = %self.socket_path.display()))]
    pub async fn connect(self) -> Result<Session> {
        let config = self.build_config()?;
        let stream = connect_unix(&config.socket_path, &self.reconnect).await?;
        Session::open(stream, config).await
    }

    /// Open a session over an already connected stream.
    ///
    /// Useful for tests, where `tokio::io::duplex` stands in for the master.
    #[instrument(skip_all, err)]
    pub async fn open_stream<S: AgentxStream>(self, stream: S) -> Result<Session> {
        let config = self.build_config()?;
        Session::open(stream, config).await
    }
}

fn program_name() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .map(std::path::Path::new)
        .and_then(|p| p.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string())
}
