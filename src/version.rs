//! AgentX protocol version enumeration.

/// AgentX protocol version carried in `h.version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum Version {
    /// AgentX v1 (RFC 2741)
    #[default]
    V1,
}

impl Version {
    /// Get the wire version number.
    pub const fn as_u8(self) -> u8 {
        match self {
            Version::V1 => 1,
        }
    }

    /// Create from wire version number.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Version::V1),
            _ => None,
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Version::V1 => write!(f, "AgentXv1"),
        }
    }
}
