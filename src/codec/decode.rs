//! AgentX decoding.
//!
//! Zero-copy decoding using `Bytes` to avoid allocations. Error offsets are
//! reported relative to the start of the PDU, header included.

use super::{ByteOrder, padded_len};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::{INTERNET_PREFIX, MAX_OID_LEN, Oid};
use bytes::Bytes;
use smallvec::SmallVec;

/// Decoder over one PDU payload.
pub struct Decoder {
    data: Bytes,
    offset: usize,
    base: usize,
    order: ByteOrder,
}

impl Decoder {
    /// Create a new decoder from bytes.
    pub fn new(data: Bytes, order: ByteOrder) -> Self {
        Self::with_base(data, order, 0)
    }

    /// Create a decoder whose error offsets start at `base`.
    pub fn with_base(data: Bytes, order: ByteOrder, base: usize) -> Self {
        Self {
            data,
            offset: 0,
            base,
            order,
        }
    }

    /// Create a decoder from a byte slice (copies the data).
    pub fn from_slice(data: &[u8], order: ByteOrder) -> Self {
        Self::new(Bytes::copy_from_slice(data), order)
    }

    /// Byte order used for integer fields.
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Get the current offset, relative to the PDU start.
    pub fn offset(&self) -> usize {
        self.base + self.offset
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Check if we've reached the end.
    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    fn take(&mut self, count: usize) -> Result<&[u8]> {
        if self.remaining() < count {
            return Err(Error::decode(self.offset(), DecodeErrorKind::TruncatedData));
        }
        let start = self.offset;
        self.offset += count;
        Ok(&self.data[start..self.offset])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.take_array::<2>()?;
        Ok(match self.order {
            ByteOrder::Network => u16::from_be_bytes(bytes),
            ByteOrder::Little => u16::from_le_bytes(bytes),
        })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.take_array::<4>()?;
        Ok(match self.order {
            ByteOrder::Network => u32::from_be_bytes(bytes),
            ByteOrder::Little => u32::from_le_bytes(bytes),
        })
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.take_array::<8>()?;
        Ok(match self.order {
            ByteOrder::Network => u64::from_be_bytes(bytes),
            ByteOrder::Little => u64::from_le_bytes(bytes),
        })
    }

    /// Skip reserved bytes.
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    /// Read an OID and its include flag (RFC 2741 §5.1).
    pub fn read_oid(&mut self) -> Result<(Oid, bool)> {
        let start = self.offset();
        let n_subid = self.read_u8()? as usize;
        let prefix = self.read_u8()?;
        let include = self.read_u8()? != 0;
        self.skip(1)?;

        let prefixed = prefix != 0;
        let total = n_subid + if prefixed { INTERNET_PREFIX.len() + 1 } else { 0 };
        if total > MAX_OID_LEN {
            return Err(Error::decode(
                start,
                DecodeErrorKind::OidTooLong {
                    count: total,
                    max: MAX_OID_LEN,
                },
            ));
        }

        let mut arcs: SmallVec<[u32; 16]> = SmallVec::with_capacity(total);
        if prefixed {
            arcs.extend_from_slice(&INTERNET_PREFIX);
            arcs.push(prefix as u32);
        }
        for _ in 0..n_subid {
            arcs.push(self.read_u32()?);
        }
        Ok((Oid::from_slice(&arcs), include))
    }

    /// Read a length-prefixed, padded octet string (RFC 2741 §5.3).
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let start = self.offset();
        let len = self.read_u32()? as usize;
        let padded = padded_len(len);
        if padded > self.remaining() {
            return Err(Error::decode(
                start,
                DecodeErrorKind::LengthExceedsMax {
                    length: len,
                    max: self.remaining(),
                },
            ));
        }
        let begin = self.offset;
        let bytes = self.data.slice(begin..begin + len);
        self.offset += padded;
        Ok(bytes)
    }

    /// Fail unless every byte has been consumed.
    pub fn expect_end(&self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::decode(
                self.offset(),
                DecodeErrorKind::TrailingData {
                    remaining: self.remaining(),
                },
            ))
        }
    }
}
