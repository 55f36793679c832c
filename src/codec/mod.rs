//! AgentX binary codec (RFC 2741 §5 and §6.1).
//!
//! Every integer on the wire uses the byte order announced by the
//! `NETWORK_BYTE_ORDER` header flag. Octet strings and OIDs are padded to
//! 4-byte boundaries, so every well-formed payload length is a multiple of 4.

mod decode;
mod encode;
mod header;

pub use decode::*;
pub use encode::*;
pub use header::*;

/// Byte order of the integer fields in one PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// Big-endian, announced with `NETWORK_BYTE_ORDER`.
    #[default]
    Network,
    /// Little-endian.
    Little,
}

impl ByteOrder {
    /// Byte order announced by a header flags byte.
    pub fn from_flags(flags: Flags) -> Self {
        if flags.contains(Flags::NETWORK_BYTE_ORDER) {
            Self::Network
        } else {
            Self::Little
        }
    }
}

/// Round a length up to the next multiple of 4.
#[inline]
pub(crate) fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}
