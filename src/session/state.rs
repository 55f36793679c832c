//! Session lifecycle states.

/// Where a session is in its lifecycle.
///
/// ```text
/// Closed -> Opening -> Open -> Closing -> Closed
///              \________________________/
///                   Open refused
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No session with the master; also the terminal state.
    Closed,
    /// Open sent, waiting for the master's response.
    Opening,
    /// Registered and serving requests.
    Open,
    /// Shutting down: open transactions are being aborted.
    Closing,
}

impl SessionState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}
