//! Variable binding (VarBind) and SearchRange types.
//!
//! A VarBind pairs an OID with a value; a SearchRange bounds a GetNext.

use crate::codec::{Decoder, EncodeBuf};
use crate::error::Result;
use crate::oid::Oid;
use crate::value::Value;

/// Variable binding - an OID-value pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarBind {
    /// The object identifier.
    pub oid: Oid,
    /// The value.
    pub value: Value,
}

impl VarBind {
    /// Create a new VarBind.
    pub fn new(oid: Oid, value: Value) -> Self {
        Self { oid, value }
    }

    /// Create a VarBind with a NULL value.
    pub fn null(oid: Oid) -> Self {
        Self {
            oid,
            value: Value::Null,
        }
    }

    /// Encode as `type(2) reserved(2) name data` (RFC 2741 §5.4).
    pub fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        buf.push_u16(self.value.type_tag());
        buf.push_reserved(2);
        buf.push_oid(&self.oid, false)?;
        self.value.encode_data(buf)
    }

    /// Decode one VarBind.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let type_tag = decoder.read_u16()?;
        decoder.skip(2)?;
        let (oid, _) = decoder.read_oid()?;
        let value = Value::decode_data(type_tag, decoder)?;
        Ok(VarBind { oid, value })
    }
}

impl std::fmt::Display for VarBind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.oid, self.value)
    }
}

/// A GetNext search range (RFC 2741 §5.2).
///
/// An empty `end` means the range is unbounded above.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchRange {
    pub start: Oid,
    pub end: Oid,
    /// Whether `start` itself may be returned.
    pub include: bool,
}

impl SearchRange {
    pub fn new(start: Oid, end: Oid, include: bool) -> Self {
        Self {
            start,
            end,
            include,
        }
    }

    /// A range for a Get, where only `start` matters.
    pub fn exact(oid: Oid) -> Self {
        Self::new(oid, Oid::empty(), false)
    }

    /// True if `oid` lies within the range.
    ///
    /// ```
    /// use async_agentx::{SearchRange, oid};
    ///
    /// let range = SearchRange::new(oid!(1, 3, 6, 1, 4), oid!(1, 3, 6, 1, 5), false);
    /// assert!(!range.contains(&oid!(1, 3, 6, 1, 4)));
    /// assert!(range.contains(&oid!(1, 3, 6, 1, 4, 1)));
    /// assert!(!range.contains(&oid!(1, 3, 6, 1, 5)));
    /// ```
    pub fn contains(&self, oid: &Oid) -> bool {
        let above_start = if self.include {
            *oid >= self.start
        } else {
            *oid > self.start
        };
        above_start && self.below_end(oid)
    }

    /// True if `oid` is under the (exclusive) upper bound.
    pub fn below_end(&self, oid: &Oid) -> bool {
        self.end.is_empty() || *oid < self.end
    }

    pub fn encode(&self, buf: &mut EncodeBuf) -> Result<()> {
        buf.push_oid(&self.start, self.include)?;
        if self.end.is_empty() {
            buf.push_null_oid();
            Ok(())
        } else {
            buf.push_oid(&self.end, false)
        }
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let (start, include) = decoder.read_oid()?;
        let (end, _) = decoder.read_oid()?;
        Ok(Self {
            start,
            end,
            include,
        })
    }
}

impl std::fmt::Display for SearchRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let open = if self.include { '[' } else { '(' };
        if self.end.is_empty() {
            write!(f, "{}{}, ..)", open, self.start)
        } else {
            write!(f, "{}{}, {})", open, self.start, self.end)
        }
    }
}

/// Encode a list of VarBinds.
pub fn encode_varbind_list(buf: &mut EncodeBuf, varbinds: &[VarBind]) -> Result<()> {
    varbinds.iter().try_for_each(|vb| vb.encode(buf))
}

/// Decode VarBinds until the payload is exhausted.
pub fn decode_varbind_list(decoder: &mut Decoder) -> Result<Vec<VarBind>> {
    let mut varbinds = Vec::new();
    while !decoder.is_empty() {
        varbinds.push(VarBind::decode(decoder)?);
    }
    Ok(varbinds)
}

/// Encode a list of SearchRanges.
pub fn encode_search_ranges(buf: &mut EncodeBuf, ranges: &[SearchRange]) -> Result<()> {
    ranges.iter().try_for_each(|r| r.encode(buf))
}

/// Decode SearchRanges until the payload is exhausted.
pub fn decode_search_ranges(decoder: &mut Decoder) -> Result<Vec<SearchRange>> {
    let mut ranges = Vec::new();
    while !decoder.is_empty() {
        ranges.push(SearchRange::decode(decoder)?);
    }
    Ok(ranges)
}
