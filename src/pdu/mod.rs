//! AgentX PDU types (RFC 2741 §6.2).
//!
//! A [`Pdu`] is a header, an optional non-default context and a typed body.
//! [`Pdu::encode`] and [`Pdu::decode`] convert between that and one complete
//! frame.

mod body;

pub use body::*;

use crate::codec::{Decoder, EncodeBuf, Flags, HEADER_LEN, Header};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::varbind::{
    decode_search_ranges, decode_varbind_list, encode_search_ranges, encode_varbind_list,
};
use bytes::Bytes;

/// PDU type codes (`h.type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PduType {
    Open = 1,
    Close = 2,
    Register = 3,
    Unregister = 4,
    Get = 5,
    GetNext = 6,
    GetBulk = 7,
    TestSet = 8,
    CommitSet = 9,
    UndoSet = 10,
    CleanupSet = 11,
    Notify = 12,
    Ping = 13,
    IndexAllocate = 14,
    IndexDeallocate = 15,
    AddAgentCaps = 16,
    RemoveAgentCaps = 17,
    Response = 18,
}

impl PduType {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Open,
            2 => Self::Close,
            3 => Self::Register,
            4 => Self::Unregister,
            5 => Self::Get,
            6 => Self::GetNext,
            7 => Self::GetBulk,
            8 => Self::TestSet,
            9 => Self::CommitSet,
            10 => Self::UndoSet,
            11 => Self::CleanupSet,
            12 => Self::Notify,
            13 => Self::Ping,
            14 => Self::IndexAllocate,
            15 => Self::IndexDeallocate,
            16 => Self::AddAgentCaps,
            17 => Self::RemoveAgentCaps,
            18 => Self::Response,
            _ => return None,
        })
    }

    /// Whether this PDU type may carry a non-default context (RFC 2741 §6.1.1).
    pub const fn carries_context(self) -> bool {
        !matches!(
            self,
            Self::Open
                | Self::Close
                | Self::CommitSet
                | Self::UndoSet
                | Self::CleanupSet
                | Self::Response
        )
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Open => "Open",
            Self::Close => "Close",
            Self::Register => "Register",
            Self::Unregister => "Unregister",
            Self::Get => "Get",
            Self::GetNext => "GetNext",
            Self::GetBulk => "GetBulk",
            Self::TestSet => "TestSet",
            Self::CommitSet => "CommitSet",
            Self::UndoSet => "UndoSet",
            Self::CleanupSet => "CleanupSet",
            Self::Notify => "Notify",
            Self::Ping => "Ping",
            Self::IndexAllocate => "IndexAllocate",
            Self::IndexDeallocate => "IndexDeallocate",
            Self::AddAgentCaps => "AddAgentCaps",
            Self::RemoveAgentCaps => "RemoveAgentCaps",
            Self::Response => "Response",
        };
        f.write_str(name)
    }
}

/// Typed PDU body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PduBody {
    Open(OpenPdu),
    Close(ClosePdu),
    Register(RegisterPdu),
    Unregister(UnregisterPdu),
    Get(Vec<crate::varbind::SearchRange>),
    GetNext(Vec<crate::varbind::SearchRange>),
    GetBulk(GetBulkPdu),
    TestSet(Vec<crate::varbind::VarBind>),
    CommitSet,
    UndoSet,
    CleanupSet,
    Notify(Vec<crate::varbind::VarBind>),
    Ping,
    IndexAllocate(Vec<crate::varbind::VarBind>),
    IndexDeallocate(Vec<crate::varbind::VarBind>),
    AddAgentCaps(AgentCapsPdu),
    RemoveAgentCaps(crate::oid::Oid),
    Response(ResponsePdu),
}

impl PduBody {
    pub fn pdu_type(&self) -> PduType {
        match self {
            Self::Open(_) => PduType::Open,
            Self::Close(_) => PduType::Close,
            Self::Register(_) => PduType::Register,
            Self::Unregister(_) => PduType::Unregister,
            Self::Get(_) => PduType::Get,
            Self::GetNext(_) => PduType::GetNext,
            Self::GetBulk(_) => PduType::GetBulk,
            Self::TestSet(_) => PduType::TestSet,
            Self::CommitSet => PduType::CommitSet,
            Self::UndoSet => PduType::UndoSet,
            Self::CleanupSet => PduType::CleanupSet,
            Self::Notify(_) => PduType::Notify,
            Self::Ping => PduType::Ping,
            Self::IndexAllocate(_) => PduType::IndexAllocate,
            Self::IndexDeallocate(_) => PduType::IndexDeallocate,
            Self::AddAgentCaps(_) => PduType::AddAgentCaps,
            Self::RemoveAgentCaps(_) => PduType::RemoveAgentCaps,
            Self::Response(_) => PduType::Response,
        }
    }

    fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        match self {
            Self::Open(open) => open.encode(buf),
            Self::Close(close) => {
                close.encode(buf);
                Ok(())
            }
            Self::Register(reg) => reg.encode(buf),
            Self::Unregister(unreg) => unreg.encode(buf),
            Self::Get(ranges) | Self::GetNext(ranges) => encode_search_ranges(buf, ranges),
            Self::GetBulk(bulk) => bulk.encode(buf),
            Self::TestSet(vbs)
            | Self::Notify(vbs)
            | Self::IndexAllocate(vbs)
            | Self::IndexDeallocate(vbs) => encode_varbind_list(buf, vbs),
            Self::CommitSet | Self::UndoSet | Self::CleanupSet | Self::Ping => Ok(()),
            Self::AddAgentCaps(caps) => caps.encode(buf),
            Self::RemoveAgentCaps(id) => buf.push_oid(id, false),
            Self::Response(resp) => resp.encode(buf),
        }
    }

    fn decode(pdu_type: PduType, decoder: &mut Decoder) -> Result<Self> {
        let body = match pdu_type {
            PduType::Open => Self::Open(OpenPdu::decode(decoder)?),
            PduType::Close => Self::Close(ClosePdu::decode(decoder)?),
            PduType::Register => Self::Register(RegisterPdu::decode(decoder)?),
            PduType::Unregister => Self::Unregister(UnregisterPdu::decode(decoder)?),
            PduType::Get => Self::Get(decode_search_ranges(decoder)?),
            PduType::GetNext => Self::GetNext(decode_search_ranges(decoder)?),
            PduType::GetBulk => Self::GetBulk(GetBulkPdu::decode(decoder)?),
            PduType::TestSet => Self::TestSet(decode_varbind_list(decoder)?),
            PduType::CommitSet => Self::CommitSet,
            PduType::UndoSet => Self::UndoSet,
            PduType::CleanupSet => Self::CleanupSet,
            PduType::Notify => Self::Notify(decode_varbind_list(decoder)?),
            PduType::Ping => Self::Ping,
            PduType::IndexAllocate => Self::IndexAllocate(decode_varbind_list(decoder)?),
            PduType::IndexDeallocate => Self::IndexDeallocate(decode_varbind_list(decoder)?),
            PduType::AddAgentCaps => Self::AddAgentCaps(AgentCapsPdu::decode(decoder)?),
            PduType::RemoveAgentCaps => Self::RemoveAgentCaps(decoder.read_oid()?.0),
            PduType::Response => Self::Response(ResponsePdu::decode(decoder)?),
        };
        decoder.expect_end()?;
        Ok(body)
    }
}

/// One complete AgentX PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub header: Header,
    /// Non-default context, only meaningful on context-bearing types.
    pub context: Option<Bytes>,
    pub body: PduBody,
}

impl Pdu {
    /// Create a PDU in network byte order with zeroed ids.
    pub fn new(body: PduBody) -> Self {
        Self {
            header: Header::new(body.pdu_type()),
            context: None,
            body,
        }
    }

    pub fn pdu_type(&self) -> PduType {
        self.body.pdu_type()
    }

    /// Encode to one frame, header included.
    ///
    /// The header's type and `NON_DEFAULT_CONTEXT` bit are derived from the
    /// body and context rather than trusted from the header fields.
    pub fn encode(&self) -> Result<Bytes> {
        let pdu_type = self.body.pdu_type();
        let context = self.context.as_ref().filter(|_| pdu_type.carries_context());

        let mut header = self.header;
        header.pdu_type = pdu_type;
        header.flags = match context {
            Some(_) => header.flags.with(Flags::NON_DEFAULT_CONTEXT),
            None => header.flags.without(Flags::NON_DEFAULT_CONTEXT),
        };

        let mut buf = EncodeBuf::new(header.byte_order());
        header.encode(&mut buf);
        if let Some(context) = context {
            buf.push_octet_string(context)?;
        }
        self.body.encode(&mut buf)?;

        let payload_len = buf.len() - HEADER_LEN;
        buf.patch_u32(HEADER_LEN - 4, payload_len as u32);
        Ok(buf.finish())
    }

    /// Decode one frame.
    ///
    /// The buffer must hold exactly one PDU: a payload length that disagrees
    /// with the bytes present is a parse error, not a truncation.
    pub fn decode(data: Bytes) -> Result<Self> {
        let (mut header, payload_len) = Header::decode(&data)?;

        let actual = data.len() - HEADER_LEN;
        if payload_len != actual {
            return Err(Error::decode(
                HEADER_LEN - 4,
                DecodeErrorKind::PayloadLengthMismatch {
                    declared: payload_len,
                    actual,
                },
            ));
        }
        if payload_len % 4 != 0 {
            return Err(Error::decode(
                HEADER_LEN - 4,
                DecodeErrorKind::UnalignedPayload {
                    length: payload_len,
                },
            ));
        }

        let mut decoder =
            Decoder::with_base(data.slice(HEADER_LEN..), header.byte_order(), HEADER_LEN);

        let context = if header.flags.contains(Flags::NON_DEFAULT_CONTEXT)
            && header.pdu_type.carries_context()
        {
            Some(decoder.read_octet_string()?)
        } else {
            None
        };
        header.flags = header.flags.without(Flags::NON_DEFAULT_CONTEXT);

        let body = PduBody::decode(header.pdu_type, &mut decoder)?;
        Ok(Self {
            header,
            context,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ByteOrder;
    use crate::oid;
    use crate::value::Value;
    use crate::varbind::{SearchRange, VarBind};

    fn roundtrip(pdu: &Pdu) -> Pdu {
        Pdu::decode(pdu.encode().unwrap()).unwrap()
    }

    #[test]
    fn test_ping_with_context() {
        let mut pdu = Pdu::new(PduBody::Ping);
        pdu.header.session_id = 3;
        pdu.header.packet_id = 11;
        pdu.context = Some(Bytes::from_static(b"ctx"));

        let bytes = pdu.encode().unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 8);
        assert_eq!(bytes[2], 0x18);
        assert_eq!(&bytes[16..20], &[0, 0, 0, 8]);
        assert_eq!(Pdu::decode(bytes).unwrap(), pdu);
    }

    #[test]
    fn test_context_dropped_for_response() {
        let mut pdu = Pdu::new(PduBody::Response(ResponsePdu::default()));
        pdu.context = Some(Bytes::from_static(b"ignored"));
        let decoded = roundtrip(&pdu);
        assert_eq!(decoded.context, None);
    }

    #[test]
    fn test_little_endian_get() {
        let mut pdu = Pdu::new(PduBody::Get(vec![SearchRange::exact(oid!(
            1, 3, 6, 1, 4, 1, 99999, 1
        ))]));
        pdu.header.flags = Flags::for_order(ByteOrder::Little);
        pdu.header.transaction_id = 0x0102_0304;

        let bytes = pdu.encode().unwrap();
        assert_eq!(&bytes[8..12], &[4, 3, 2, 1]);
        assert_eq!(Pdu::decode(bytes).unwrap(), pdu);
    }

    #[test]
    fn test_payload_length_mismatch() {
        let bytes = Pdu::new(PduBody::Ping).encode().unwrap();
        let mut extended = bytes.to_vec();
        extended.extend_from_slice(&[0, 0, 0, 0]);
        assert!(matches!(
            Pdu::decode(Bytes::from(extended)),
            Err(Error::Parse {
                kind: DecodeErrorKind::PayloadLengthMismatch {
                    declared: 0,
                    actual: 4
                },
                ..
            })
        ));
    }

    #[test]
    fn test_truncated_body() {
        let pdu = Pdu::new(PduBody::TestSet(vec![VarBind::new(
            oid!(1, 3, 6, 1, 4, 1, 99999, 1),
            Value::Counter64(7),
        )]));
        let bytes = pdu.encode().unwrap();
        // Drop the last 4 bytes and fix up the declared length to match
        let mut short = bytes[..bytes.len() - 4].to_vec();
        let len = (short.len() - HEADER_LEN) as u32;
        short[16..20].copy_from_slice(&len.to_be_bytes());
        assert!(matches!(
            Pdu::decode(Bytes::from(short)),
            Err(Error::Parse {
                kind: DecodeErrorKind::TruncatedData,
                ..
            })
        ));
    }

    #[test]
    fn test_trailing_data_in_fixed_body() {
        let mut bytes = Pdu::new(PduBody::CommitSet).encode().unwrap().to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes[19] = 4;
        assert!(matches!(
            Pdu::decode(Bytes::from(bytes)),
            Err(Error::Parse {
                kind: DecodeErrorKind::TrailingData { remaining: 4 },
                ..
            })
        ));
    }

    #[test]
    fn test_pdu_type_codes() {
        for code in 1..=18 {
            let pdu_type = PduType::from_u8(code).unwrap();
            assert_eq!(pdu_type.as_u8(), code);
        }
        assert_eq!(PduType::from_u8(0), None);
        assert_eq!(PduType::from_u8(19), None);
    }
}
