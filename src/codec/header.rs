//! The fixed 20-byte AgentX header (RFC 2741 §6.1).

use super::{ByteOrder, Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::PduType;
use crate::version::Version;

/// Size of the fixed header preceding every payload.
pub const HEADER_LEN: usize = 20;

/// Header flag bits (`h.flags`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u8);

impl Flags {
    pub const INSTANCE_REGISTRATION: Flags = Flags(0x01);
    pub const NEW_INDEX: Flags = Flags(0x02);
    pub const ANY_INDEX: Flags = Flags(0x04);
    pub const NON_DEFAULT_CONTEXT: Flags = Flags(0x08);
    pub const NETWORK_BYTE_ORDER: Flags = Flags(0x10);

    pub const fn empty() -> Self {
        Flags(0)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Flags(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn with(self, other: Flags) -> Self {
        Flags(self.0 | other.0)
    }

    #[must_use]
    pub const fn without(self, other: Flags) -> Self {
        Flags(self.0 & !other.0)
    }

    /// Flags for a PDU sent in the given byte order.
    pub const fn for_order(order: ByteOrder) -> Self {
        match order {
            ByteOrder::Network => Self::NETWORK_BYTE_ORDER,
            ByteOrder::Little => Self::empty(),
        }
    }
}

impl std::ops::BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        self.with(rhs)
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Flags(0x{:02X})", self.0)
    }
}

/// Decoded header fields, without the payload length.
///
/// The length is a framing detail computed on encode and checked on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub pdu_type: PduType,
    pub flags: Flags,
    pub session_id: u32,
    pub transaction_id: u32,
    pub packet_id: u32,
}

impl Header {
    pub fn new(pdu_type: PduType) -> Self {
        Self {
            pdu_type,
            flags: Flags::NETWORK_BYTE_ORDER,
            session_id: 0,
            transaction_id: 0,
            packet_id: 0,
        }
    }

    /// Byte order announced by this header.
    pub fn byte_order(&self) -> ByteOrder {
        ByteOrder::from_flags(self.flags)
    }

    /// Write the header with a zero payload length placeholder.
    pub(crate) fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_u8(Version::V1.as_u8());
        buf.push_u8(self.pdu_type.as_u8());
        buf.push_u8(self.flags.bits());
        buf.push_reserved(1);
        buf.push_u32(self.session_id);
        buf.push_u32(self.transaction_id);
        buf.push_u32(self.packet_id);
        buf.push_u32(0);
    }

    /// Parse the 20-byte header, returning it with the declared payload length.
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < HEADER_LEN {
            return Err(Error::decode(
                0,
                DecodeErrorKind::TruncatedHeader { length: data.len() },
            ));
        }

        let version = data[0];
        if Version::from_u8(version).is_none() {
            return Err(Error::decode(0, DecodeErrorKind::UnsupportedVersion(version)));
        }
        let pdu_type = PduType::from_u8(data[1])
            .ok_or_else(|| Error::decode(1, DecodeErrorKind::UnknownPduType(data[1])))?;
        let flags = Flags::from_bits(data[2]);

        let mut d = Decoder::from_slice(&data[4..HEADER_LEN], ByteOrder::from_flags(flags));
        let session_id = d.read_u32()?;
        let transaction_id = d.read_u32()?;
        let packet_id = d.read_u32()?;
        let payload_len = d.read_u32()? as usize;

        Ok((
            Self {
                pdu_type,
                flags,
                session_id,
                transaction_id,
                packet_id,
            },
            payload_len,
        ))
    }
}
