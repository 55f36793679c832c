//! AgentX encoding.
//!
//! Unlike BER, AgentX fields are fixed width, so the buffer writes forward
//! and only the header payload length is patched once the body is known.

use super::{ByteOrder, padded_len};
use crate::error::{EncodeErrorKind, Error, Result};
use crate::oid::{MAX_OID_LEN, Oid};
use bytes::{BufMut, Bytes, BytesMut};

/// Forward-writing buffer for one AgentX PDU.
pub struct EncodeBuf {
    buf: BytesMut,
    order: ByteOrder,
}

impl EncodeBuf {
    /// Create a new encode buffer with default capacity.
    pub fn new(order: ByteOrder) -> Self {
        Self::with_capacity(order, 256)
    }

    /// Create a new encode buffer with specified capacity.
    pub fn with_capacity(order: ByteOrder, capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            order,
        }
    }

    /// Byte order used for integer fields.
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Get the current length of encoded data.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn push_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn push_u16(&mut self, value: u16) {
        match self.order {
            ByteOrder::Network => self.buf.put_u16(value),
            ByteOrder::Little => self.buf.put_u16_le(value),
        }
    }

    pub fn push_u32(&mut self, value: u32) {
        match self.order {
            ByteOrder::Network => self.buf.put_u32(value),
            ByteOrder::Little => self.buf.put_u32_le(value),
        }
    }

    pub fn push_u64(&mut self, value: u64) {
        match self.order {
            ByteOrder::Network => self.buf.put_u64(value),
            ByteOrder::Little => self.buf.put_u64_le(value),
        }
    }

    /// Push `count` zero bytes for reserved fields.
    pub fn push_reserved(&mut self, count: usize) {
        self.buf.put_bytes(0, count);
    }

    /// Push an OID (RFC 2741 §5.1), compressing the `1.3.6.1` prefix when possible.
    pub fn push_oid(&mut self, oid: &Oid, include: bool) -> Result<()> {
        if oid.len() > MAX_OID_LEN {
            return Err(Error::encode(EncodeErrorKind::OidTooLong {
                count: oid.len(),
                max: MAX_OID_LEN,
            }));
        }

        let (prefix, arcs) = match oid.internet_prefix() {
            Some((prefix, rest)) => (prefix, rest),
            None => (0, oid.arcs()),
        };

        self.push_u8(arcs.len() as u8);
        self.push_u8(prefix);
        self.push_u8(include as u8);
        self.push_reserved(1);
        for &arc in arcs {
            self.push_u32(arc);
        }
        Ok(())
    }

    /// Push a null OID (`n_subid` and prefix both zero).
    pub fn push_null_oid(&mut self) {
        self.push_reserved(4);
    }

    /// Push a length-prefixed octet string padded to 4 bytes (RFC 2741 §5.3).
    pub fn push_octet_string(&mut self, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len()).map_err(|_| {
            Error::encode(EncodeErrorKind::StringTooLong {
                length: data.len(),
            })
        })?;
        self.push_u32(len);
        self.buf.put_slice(data);
        self.push_reserved(padded_len(data.len()) - data.len());
        Ok(())
    }

    /// Overwrite a previously written u32, used for the header payload length.
    pub(crate) fn patch_u32(&mut self, position: usize, value: u32) {
        let bytes = match self.order {
            ByteOrder::Network => value.to_be_bytes(),
            ByteOrder::Little => value.to_le_bytes(),
        };
        self.buf[position..position + 4].copy_from_slice(&bytes);
    }

    /// Finish encoding and return the bytes.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}
