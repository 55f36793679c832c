//! Fixed-layout PDU bodies.

use crate::codec::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, EncodeErrorKind, Error, ResponseError, Result};
use crate::oid::Oid;
use crate::varbind::{
    SearchRange, VarBind, decode_search_ranges, decode_varbind_list, encode_search_ranges,
    encode_varbind_list,
};
use bytes::Bytes;

/// agentx-Open-PDU (§6.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenPdu {
    /// Default response timeout in seconds, 0 for the master's default.
    pub timeout: u8,
    /// Subagent identifier, may be the null OID.
    pub id: Oid,
    pub description: Bytes,
}

impl OpenPdu {
    pub(crate) fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        buf.push_u8(self.timeout);
        buf.push_reserved(3);
        buf.push_oid(&self.id, false)?;
        buf.push_octet_string(&self.description)
    }

    pub(crate) fn decode(d: &mut Decoder) -> Result<Self> {
        let timeout = d.read_u8()?;
        d.skip(3)?;
        let (id, _) = d.read_oid()?;
        let description = d.read_octet_string()?;
        Ok(Self {
            timeout,
            id,
            description,
        })
    }
}

/// Close reasons (§6.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    Other = 1,
    ParseError = 2,
    ProtocolError = 3,
    Timeouts = 4,
    Shutdown = 5,
    ByManager = 6,
}

impl CloseReason {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => Self::Other,
            2 => Self::ParseError,
            3 => Self::ProtocolError,
            4 => Self::Timeouts,
            5 => Self::Shutdown,
            6 => Self::ByManager,
            _ => return None,
        })
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Other => "reasonOther",
            Self::ParseError => "reasonParseError",
            Self::ProtocolError => "reasonProtocolError",
            Self::Timeouts => "reasonTimeouts",
            Self::Shutdown => "reasonShutdown",
            Self::ByManager => "reasonByManager",
        };
        f.write_str(name)
    }
}

/// agentx-Close-PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosePdu {
    pub reason: CloseReason,
}

impl ClosePdu {
    pub(crate) fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_u8(self.reason.as_u8());
        buf.push_reserved(3);
    }

    pub(crate) fn decode(d: &mut Decoder) -> Result<Self> {
        let start = d.offset();
        let code = d.read_u8()?;
        d.skip(3)?;
        let reason = CloseReason::from_u8(code)
            .ok_or_else(|| Error::decode(start, DecodeErrorKind::UnknownCloseReason(code)))?;
        Ok(Self { reason })
    }
}

/// agentx-Register-PDU (§6.2.3).
///
/// With `range_subid` non-zero, the registration covers every OID that
/// matches `subtree` except at position `range_subid` (1-based), whose
/// value may run from the subtree's arc up to `upper_bound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterPdu {
    pub timeout: u8,
    pub priority: u8,
    pub range_subid: u8,
    pub subtree: Oid,
    pub upper_bound: Option<u32>,
}

impl RegisterPdu {
    pub(crate) fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        buf.push_u8(self.timeout);
        buf.push_u8(self.priority);
        buf.push_u8(self.range_subid);
        buf.push_reserved(1);
        buf.push_oid(&self.subtree, false)?;
        push_upper_bound(buf, self.range_subid, self.upper_bound)
    }

    pub(crate) fn decode(d: &mut Decoder) -> Result<Self> {
        let timeout = d.read_u8()?;
        let priority = d.read_u8()?;
        let range_subid = d.read_u8()?;
        d.skip(1)?;
        let (subtree, _) = d.read_oid()?;
        let upper_bound = if range_subid != 0 {
            Some(d.read_u32()?)
        } else {
            None
        };
        Ok(Self {
            timeout,
            priority,
            range_subid,
            subtree,
            upper_bound,
        })
    }
}

/// agentx-Unregister-PDU (§6.2.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnregisterPdu {
    pub priority: u8,
    pub range_subid: u8,
    pub subtree: Oid,
    pub upper_bound: Option<u32>,
}

impl UnregisterPdu {
    pub(crate) fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        buf.push_reserved(1);
        buf.push_u8(self.priority);
        buf.push_u8(self.range_subid);
        buf.push_reserved(1);
        buf.push_oid(&self.subtree, false)?;
        push_upper_bound(buf, self.range_subid, self.upper_bound)
    }

    pub(crate) fn decode(d: &mut Decoder) -> Result<Self> {
        d.skip(1)?;
        let priority = d.read_u8()?;
        let range_subid = d.read_u8()?;
        d.skip(1)?;
        let (subtree, _) = d.read_oid()?;
        let upper_bound = if range_subid != 0 {
            Some(d.read_u32()?)
        } else {
            None
        };
        Ok(Self {
            priority,
            range_subid,
            subtree,
            upper_bound,
        })
    }
}

fn push_upper_bound(buf: &mut EncodeBuf, range_subid: u8, upper_bound: Option<u32>) -> Result<()> {
    match (range_subid, upper_bound) {
        (0, None) => Ok(()),
        (_, Some(bound)) if range_subid != 0 => {
            buf.push_u32(bound);
            Ok(())
        }
        _ => Err(Error::encode(EncodeErrorKind::RangeBoundMismatch { range_subid })),
    }
}

/// agentx-GetBulk-PDU (§6.2.7).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetBulkPdu {
    pub non_repeaters: u16,
    pub max_repetitions: u16,
    pub ranges: Vec<SearchRange>,
}

impl GetBulkPdu {
    pub(crate) fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        buf.push_u16(self.non_repeaters);
        buf.push_u16(self.max_repetitions);
        encode_search_ranges(buf, &self.ranges)
    }

    pub(crate) fn decode(d: &mut Decoder) -> Result<Self> {
        let non_repeaters = d.read_u16()?;
        let max_repetitions = d.read_u16()?;
        let ranges = decode_search_ranges(d)?;
        Ok(Self {
            non_repeaters,
            max_repetitions,
            ranges,
        })
    }
}

/// agentx-AddAgentCaps-PDU (§6.2.14).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCapsPdu {
    pub id: Oid,
    pub description: Bytes,
}

impl AgentCapsPdu {
    pub(crate) fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        buf.push_oid(&self.id, false)?;
        buf.push_octet_string(&self.description)
    }

    pub(crate) fn decode(d: &mut Decoder) -> Result<Self> {
        let (id, _) = d.read_oid()?;
        let description = d.read_octet_string()?;
        Ok(Self { id, description })
    }
}

/// agentx-Response-PDU (§6.2.16).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePdu {
    /// sysUpTime.0 of the sender; subagents send 0.
    pub sys_uptime: u32,
    pub error: ResponseError,
    /// 1-based index of the failing VarBind, 0 when not applicable.
    pub index: u16,
    pub varbinds: Vec<VarBind>,
}

impl Default for ResponsePdu {
    fn default() -> Self {
        Self {
            sys_uptime: 0,
            error: ResponseError::NoError,
            index: 0,
            varbinds: Vec::new(),
        }
    }
}

impl ResponsePdu {
    /// A successful response carrying VarBinds.
    pub fn ok(varbinds: Vec<VarBind>) -> Self {
        Self {
            varbinds,
            ..Self::default()
        }
    }

    /// An error response without VarBinds.
    pub fn error(error: ResponseError, index: u16) -> Self {
        Self {
            error,
            index,
            ..Self::default()
        }
    }

    pub(crate) fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        buf.push_u32(self.sys_uptime);
        buf.push_u16(self.error.as_u16());
        buf.push_u16(self.index);
        encode_varbind_list(buf, &self.varbinds)
    }

    pub(crate) fn decode(d: &mut Decoder) -> Result<Self> {
        let sys_uptime = d.read_u32()?;
        let error = ResponseError::from_u16(d.read_u16()?);
        let index = d.read_u16()?;
        let varbinds = decode_varbind_list(d)?;
        Ok(Self {
            sys_uptime,
            error,
            index,
            varbinds,
        })
    }
}
