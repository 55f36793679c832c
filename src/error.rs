//! Error types for async-agentx.
//!
//! All errors are `#[non_exhaustive]` to allow adding new variants without breaking changes.

use std::path::PathBuf;
use std::time::Duration;

use crate::oid::Oid;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// PDU decode error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Header version is not AgentX v1.
    UnsupportedVersion(u8),
    /// Unknown PDU type code.
    UnknownPduType(u8),
    /// Buffer shorter than the 20-byte header.
    TruncatedHeader { length: usize },
    /// Data truncated unexpectedly.
    TruncatedData,
    /// Header payload length disagrees with the bytes present.
    PayloadLengthMismatch { declared: usize, actual: usize },
    /// Payload length is not a multiple of 4.
    UnalignedPayload { length: usize },
    /// Bytes left over after a fixed-size body.
    TrailingData { remaining: usize },
    /// OID sub-identifier count exceeds the protocol maximum.
    OidTooLong { count: usize, max: usize },
    /// Unknown VarBind value type.
    UnknownValueType(u16),
    /// IpAddress payload was not 4 bytes.
    InvalidIpAddressLength { length: usize },
    /// Close reason code outside 1..=6.
    UnknownCloseReason(u8),
    /// Octet string length exceeds the remaining payload.
    LengthExceedsMax { length: usize, max: usize },
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedVersion(v) => write!(f, "unsupported AgentX version: {}", v),
            Self::UnknownPduType(t) => write!(f, "unknown PDU type: {}", t),
            Self::TruncatedHeader { length } => {
                write!(f, "header needs 20 bytes, got {}", length)
            }
            Self::TruncatedData => write!(f, "unexpected end of data"),
            Self::PayloadLengthMismatch { declared, actual } => {
                write!(
                    f,
                    "payload length mismatch: header declares {}, got {}",
                    declared, actual
                )
            }
            Self::UnalignedPayload { length } => {
                write!(f, "payload length {} is not a multiple of 4", length)
            }
            Self::TrailingData { remaining } => {
                write!(f, "{} unexpected trailing bytes", remaining)
            }
            Self::OidTooLong { count, max } => {
                write!(f, "OID has {} sub-identifiers, exceeds maximum {}", count, max)
            }
            Self::UnknownValueType(t) => write!(f, "unknown value type: {}", t),
            Self::InvalidIpAddressLength { length } => {
                write!(f, "IP address must be 4 bytes, got {}", length)
            }
            Self::UnknownCloseReason(r) => write!(f, "unknown close reason: {}", r),
            Self::LengthExceedsMax { length, max } => {
                write!(f, "length {} exceeds maximum {}", length, max)
            }
        }
    }
}

/// PDU encode error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeErrorKind {
    /// OID longer than the protocol allows.
    OidTooLong { count: usize, max: usize },
    /// Octet string does not fit the 32-bit length field.
    StringTooLong { length: usize },
    /// `upper_bound` must be present exactly when `range_subid` is non-zero.
    RangeBoundMismatch { range_subid: u8 },
}

impl std::fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OidTooLong { count, max } => {
                write!(f, "OID has {} sub-identifiers, exceeds maximum {}", count, max)
            }
            Self::StringTooLong { length } => write!(f, "octet string of {} bytes", length),
            Self::RangeBoundMismatch { range_subid: 0 } => {
                write!(f, "upper bound given without a range sub-identifier")
            }
            Self::RangeBoundMismatch { range_subid } => {
                write!(f, "range sub-identifier {} without an upper bound", range_subid)
            }
        }
    }
}

/// OID validation error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OidErrorKind {
    /// Empty OID string.
    Empty,
    /// Invalid arc value.
    InvalidArc,
    /// OID has too many arcs (exceeds MAX_OID_LEN).
    TooManyArcs { count: usize, max: usize },
}

impl std::fmt::Display for OidErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty OID"),
            Self::InvalidArc => write!(f, "invalid arc value"),
            Self::TooManyArcs { count, max } => {
                write!(f, "OID has {} arcs, exceeds maximum {}", count, max)
            }
        }
    }
}

/// Semantic protocol violations on well-formed PDUs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    /// The master answered a request with an error.
    ErrorResponse { status: ResponseError, index: u16 },
}

impl std::fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ErrorResponse { status, index } => {
                write!(f, "master returned {} at index {}", status, index)
            }
        }
    }
}

/// Why a registration was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationErrorKind {
    /// Same subtree, priority and context are already registered.
    Duplicate,
    /// The range sub-identifier or upper bound is unusable.
    InvalidRange,
    /// The registration handle is not known to the registry.
    UnknownRegistration,
    /// The master refused the registration for another reason.
    Rejected(ResponseError),
}

impl std::fmt::Display for RegistrationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Duplicate => write!(f, "duplicate registration"),
            Self::InvalidRange => write!(f, "invalid range"),
            Self::UnknownRegistration => write!(f, "unknown registration"),
            Self::Rejected(status) => write!(f, "rejected by master: {}", status),
        }
    }
}

/// Terminal reasons for an established session ending unexpectedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LostReason {
    /// Consecutive pings went unanswered.
    MissedPings { count: u32 },
    /// The master sent an unsolicited Close.
    ClosedByMaster(crate::pdu::CloseReason),
    /// The socket hit EOF or an I/O error.
    Disconnected,
    /// A malformed PDU was received.
    ParseError,
}

impl std::fmt::Display for LostReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissedPings { count } => write!(f, "{} consecutive pings unanswered", count),
            Self::ClosedByMaster(reason) => write!(f, "closed by master ({})", reason),
            Self::Disconnected => write!(f, "connection lost"),
            Self::ParseError => write!(f, "malformed PDU received"),
        }
    }
}

/// AgentX `res.error` codes (RFC 2741 §6.2.16).
///
/// Values below 256 reuse the SNMP error-status codes; the AgentX specific
/// codes start at 256.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ResponseError {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    OpenFailed,
    NotOpen,
    IndexWrongType,
    IndexAlreadyAllocated,
    IndexNoneAvailable,
    IndexNotAllocated,
    UnsupportedContext,
    DuplicateRegistration,
    UnknownRegistration,
    UnknownAgentCaps,
    ParseError,
    RequestDenied,
    ProcessingError,
    /// Unknown/future error code.
    Unknown(u16),
}

impl ResponseError {
    /// Create from raw error code.
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            6 => Self::NoAccess,
            7 => Self::WrongType,
            8 => Self::WrongLength,
            9 => Self::WrongEncoding,
            10 => Self::WrongValue,
            11 => Self::NoCreation,
            12 => Self::InconsistentValue,
            13 => Self::ResourceUnavailable,
            14 => Self::CommitFailed,
            15 => Self::UndoFailed,
            16 => Self::AuthorizationError,
            17 => Self::NotWritable,
            18 => Self::InconsistentName,
            256 => Self::OpenFailed,
            257 => Self::NotOpen,
            258 => Self::IndexWrongType,
            259 => Self::IndexAlreadyAllocated,
            260 => Self::IndexNoneAvailable,
            261 => Self::IndexNotAllocated,
            262 => Self::UnsupportedContext,
            263 => Self::DuplicateRegistration,
            264 => Self::UnknownRegistration,
            265 => Self::UnknownAgentCaps,
            266 => Self::ParseError,
            267 => Self::RequestDenied,
            268 => Self::ProcessingError,
            other => Self::Unknown(other),
        }
    }

    /// Convert to raw error code.
    pub fn as_u16(&self) -> u16 {
        match self {
            Self::NoError => 0,
            Self::TooBig => 1,
            Self::NoSuchName => 2,
            Self::BadValue => 3,
            Self::ReadOnly => 4,
            Self::GenErr => 5,
            Self::NoAccess => 6,
            Self::WrongType => 7,
            Self::WrongLength => 8,
            Self::WrongEncoding => 9,
            Self::WrongValue => 10,
            Self::NoCreation => 11,
            Self::InconsistentValue => 12,
            Self::ResourceUnavailable => 13,
            Self::CommitFailed => 14,
            Self::UndoFailed => 15,
            Self::AuthorizationError => 16,
            Self::NotWritable => 17,
            Self::InconsistentName => 18,
            Self::OpenFailed => 256,
            Self::NotOpen => 257,
            Self::IndexWrongType => 258,
            Self::IndexAlreadyAllocated => 259,
            Self::IndexNoneAvailable => 260,
            Self::IndexNotAllocated => 261,
            Self::UnsupportedContext => 262,
            Self::DuplicateRegistration => 263,
            Self::UnknownRegistration => 264,
            Self::UnknownAgentCaps => 265,
            Self::ParseError => 266,
            Self::RequestDenied => 267,
            Self::ProcessingError => 268,
            Self::Unknown(code) => *code,
        }
    }

    /// True for `NoError`.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::NoError)
    }
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoError => write!(f, "noAgentXError"),
            Self::TooBig => write!(f, "tooBig"),
            Self::NoSuchName => write!(f, "noSuchName"),
            Self::BadValue => write!(f, "badValue"),
            Self::ReadOnly => write!(f, "readOnly"),
            Self::GenErr => write!(f, "genErr"),
            Self::NoAccess => write!(f, "noAccess"),
            Self::WrongType => write!(f, "wrongType"),
            Self::WrongLength => write!(f, "wrongLength"),
            Self::WrongEncoding => write!(f, "wrongEncoding"),
            Self::WrongValue => write!(f, "wrongValue"),
            Self::NoCreation => write!(f, "noCreation"),
            Self::InconsistentValue => write!(f, "inconsistentValue"),
            Self::ResourceUnavailable => write!(f, "resourceUnavailable"),
            Self::CommitFailed => write!(f, "commitFailed"),
            Self::UndoFailed => write!(f, "undoFailed"),
            Self::AuthorizationError => write!(f, "authorizationError"),
            Self::NotWritable => write!(f, "notWritable"),
            Self::InconsistentName => write!(f, "inconsistentName"),
            Self::OpenFailed => write!(f, "openFailed"),
            Self::NotOpen => write!(f, "notOpen"),
            Self::IndexWrongType => write!(f, "indexWrongType"),
            Self::IndexAlreadyAllocated => write!(f, "indexAlreadyAllocated"),
            Self::IndexNoneAvailable => write!(f, "indexNoneAvailable"),
            Self::IndexNotAllocated => write!(f, "indexNotAllocated"),
            Self::UnsupportedContext => write!(f, "unsupportedContext"),
            Self::DuplicateRegistration => write!(f, "duplicateRegistration"),
            Self::UnknownRegistration => write!(f, "unknownRegistration"),
            Self::UnknownAgentCaps => write!(f, "unknownAgentCaps"),
            Self::ParseError => write!(f, "parseError"),
            Self::RequestDenied => write!(f, "requestDenied"),
            Self::ProcessingError => write!(f, "processingError"),
            Self::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// Library error type.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Socket I/O failed. Fatal to the session.
    #[error("transport error{}: {source}", path.as_ref().map(|p| format!(" on {}", p.display())).unwrap_or_default())]
    Transport {
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },

    /// A received PDU was malformed. Fatal to the session.
    #[error("parse error at offset {offset}: {kind}")]
    Parse {
        offset: usize,
        kind: DecodeErrorKind,
    },

    /// PDU encoding error.
    #[error("encode error: {kind}")]
    Encode { kind: EncodeErrorKind },

    /// Well-formed but semantically invalid traffic.
    #[error("protocol error: {kind}")]
    Protocol { kind: ProtocolErrorKind },

    /// A register or unregister call was refused.
    #[error("registration of {subtree} failed: {kind}")]
    Registration {
        subtree: Oid,
        kind: RegistrationErrorKind,
    },

    /// A handler or scalar cell refused an operation.
    #[error("handler error for {oid}: {message}")]
    Handler { oid: Oid, message: Box<str> },

    /// The master refused the Open.
    #[error("open failed: {status}")]
    OpenFailed { status: ResponseError },

    /// The session ended underneath the caller; re-open to continue.
    #[error("session lost: {reason}")]
    SessionLost { reason: LostReason },

    /// The session is not open.
    #[error("session not open")]
    NotOpen,

    /// No response from the master in time.
    #[error("timeout after {elapsed:?} (packet_id={packet_id})")]
    Timeout { packet_id: u32, elapsed: Duration },

    /// Invalid OID format.
    #[error("invalid OID: {kind}")]
    InvalidOid {
        kind: OidErrorKind,
        input: Option<Box<str>>, // Only allocated when parsing string input
    },

    /// Invalid builder configuration.
    #[error("invalid configuration: {0}")]
    Config(Box<str>),
}

impl Error {
    /// Create a parse error.
    pub fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Self::Parse { offset, kind }
    }

    /// Create an encode error.
    pub fn encode(kind: EncodeErrorKind) -> Self {
        Self::Encode { kind }
    }

    /// Create a transport error.
    pub fn transport(path: Option<PathBuf>, source: std::io::Error) -> Self {
        Self::Transport { path, source }
    }

    /// Create a protocol error.
    pub fn protocol(kind: ProtocolErrorKind) -> Self {
        Self::Protocol { kind }
    }

    /// Create a registration error.
    pub fn registration(subtree: Oid, kind: RegistrationErrorKind) -> Self {
        Self::Registration { subtree, kind }
    }

    /// Create a handler error.
    pub fn handler(oid: Oid, message: impl Into<Box<str>>) -> Self {
        Self::Handler {
            oid,
            message: message.into(),
        }
    }

    /// Create an invalid OID error from a kind (no input string).
    pub fn invalid_oid(kind: OidErrorKind) -> Self {
        Self::InvalidOid { kind, input: None }
    }

    /// Create an invalid OID error with the input string that failed.
    pub fn invalid_oid_with_input(kind: OidErrorKind, input: impl Into<Box<str>>) -> Self {
        Self::InvalidOid {
            kind,
            input: Some(input.into()),
        }
    }

    /// True if the session this error came from can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Parse { .. } | Self::SessionLost { .. } | Self::NotOpen
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_error_codes() {
        for code in (0u16..=18).chain(256..=268) {
            let status = ResponseError::from_u16(code);
            assert!(!matches!(status, ResponseError::Unknown(_)), "code {}", code);
            assert_eq!(status.as_u16(), code);
        }
        assert_eq!(ResponseError::from_u16(999), ResponseError::Unknown(999));
        assert_eq!(ResponseError::from_u16(263), ResponseError::DuplicateRegistration);
    }

    #[test]
    fn test_display() {
        assert_eq!(ResponseError::NotWritable.to_string(), "notWritable");
        assert_eq!(ResponseError::ProcessingError.to_string(), "processingError");

        let err = Error::decode(20, DecodeErrorKind::UnknownPduType(99));
        assert_eq!(err.to_string(), "parse error at offset 20: unknown PDU type: 99");

        let err = Error::registration(
            crate::oid!(1, 3, 6, 1, 4, 1, 99999),
            RegistrationErrorKind::Duplicate,
        );
        assert_eq!(
            err.to_string(),
            "registration of 1.3.6.1.4.1.99999 failed: duplicate registration"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::NotOpen.is_fatal());
        assert!(Error::decode(0, DecodeErrorKind::TruncatedData).is_fatal());
        assert!(
            !Error::protocol(ProtocolErrorKind::ErrorResponse {
                status: ResponseError::RequestDenied,
                index: 0,
            })
            .is_fatal()
        );
    }
}
