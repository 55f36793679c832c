//! Request context for handlers.

use bytes::Bytes;

use crate::pdu::PduType;

/// The request a handler call belongs to.
///
/// Built by the dispatcher from the header of the master's PDU. During a
/// Set, `transaction_id` is stable across TestSet, CommitSet, UndoSet and
/// CleanupSet, which lets a handler key per-transaction scratch state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub session_id: u32,
    pub transaction_id: u32,
    pub packet_id: u32,
    /// PDU that caused this call.
    pub pdu_type: PduType,
    /// Non-default context, `None` for the default context.
    pub context: Option<Bytes>,
}

impl RequestContext {
    pub(crate) fn from_header(header: &crate::codec::Header, context: Option<Bytes>) -> Self {
        Self {
            session_id: header.session_id,
            transaction_id: header.transaction_id,
            packet_id: header.packet_id,
            pdu_type: header.pdu_type,
            context,
        }
    }

    /// Context for driving handlers outside any master request.
    #[cfg(test)]
    pub(crate) fn local(session_id: u32) -> Self {
        Self {
            session_id,
            transaction_id: 0,
            packet_id: 0,
            pdu_type: PduType::Get,
            context: None,
        }
    }
}
