//! Request dispatcher.
//!
//! Turns master-originated PDUs into handler calls and builds the response
//! bodies. The session runs one [`Dispatcher`] on its own task and feeds it
//! PDUs strictly in arrival order, so handlers never see two requests of
//! the same session at once.
//!
//! # Get
//!
//! Each SearchRange's start OID is resolved to its owning registration.
//! Unowned OIDs answer `noSuchObject`; otherwise the handler's answer is
//! used, with handler failures reported as `noSuchObject` for that VarBind
//! alone.
//!
//! # GetNext and GetBulk
//!
//! The successor of an OID is the smallest OID after it, inside the
//! request's range, that a registration both owns and has a value for.
//! Registrations are tried in order of the lowest OID they could
//! contribute, so the search stops as soon as no later registration can
//! beat the best result so far. GetBulk is exactly a sequence of GetNext
//! steps per repeater.

mod set_handler;

pub use set_handler::{Phase, PendingSetTransaction};

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::ResponseError;
use crate::handler::{GetNextResult, GetResult, RequestContext};
use crate::oid::Oid;
use crate::pdu::{GetBulkPdu, Pdu, PduBody, ResponsePdu};
use crate::registry::{Entry, MibRegistry};
use crate::value::Value;
use crate::varbind::{SearchRange, VarBind};

/// Sequential request processor for one session.
pub struct Dispatcher {
    registry: Arc<RwLock<MibRegistry>>,
    transactions: HashMap<u32, PendingSetTransaction>,
}

impl Dispatcher {
    pub fn new(registry: Arc<RwLock<MibRegistry>>) -> Self {
        Self {
            registry,
            transactions: HashMap::new(),
        }
    }

    /// Process one request and return the response body to send, if any.
    ///
    /// CleanupSet is the only request without a response. PDU types the
    /// master has no business sending are answered with `processingError`.
    pub async fn dispatch(&mut self, pdu: &Pdu) -> Option<ResponsePdu> {
        let ctx = RequestContext::from_header(&pdu.header, pdu.context.clone());
        tracing::debug!(
            target: "async_agentx::agent",
            {
                agentx.pdu_type = %pdu.pdu_type(),
                agentx.transaction_id = ctx.transaction_id,
                agentx.packet_id = ctx.packet_id,
            },
            "dispatching request"
        );

        let response = match &pdu.body {
            PduBody::Get(ranges) => self.handle_get(&ctx, ranges).await,
            PduBody::GetNext(ranges) => self.handle_get_next(&ctx, ranges).await,
            PduBody::GetBulk(bulk) => self.handle_get_bulk(&ctx, bulk).await,
            PduBody::TestSet(varbinds) => self.handle_test_set(&ctx, varbinds).await,
            PduBody::CommitSet => self.handle_commit_set(&ctx).await,
            PduBody::UndoSet => self.handle_undo_set(&ctx).await,
            PduBody::CleanupSet => {
                self.handle_cleanup_set(&ctx).await;
                return None;
            }
            other => {
                tracing::debug!(
                    target: "async_agentx::agent",
                    { agentx.pdu_type = %other.pdu_type() },
                    "unexpected PDU from master"
                );
                ResponsePdu::error(ResponseError::ProcessingError, 0)
            }
        };
        Some(response)
    }

    fn resolve(&self, ctx: &RequestContext, oid: &Oid) -> Option<Arc<Entry>> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .resolve(ctx.context.as_ref(), oid)
    }

    fn candidates(&self, ctx: &RequestContext, after: &Oid) -> Vec<(Oid, Arc<Entry>)> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .candidates_from(ctx.context.as_ref(), after)
    }

    /// The value at exactly `oid`, as a Get would see it.
    async fn get_value(&self, ctx: &RequestContext, oid: &Oid) -> Value {
        let Some(entry) = self.resolve(ctx, oid) else {
            return Value::NoSuchObject;
        };
        let handler = &entry.registration.handler;
        if !handler.capabilities().get {
            return Value::NoSuchObject;
        }
        match handler.get(ctx, entry.anchor(), oid).await {
            GetResult::Failed(message) => {
                tracing::warn!(
                    target: "async_agentx::agent",
                    { agentx.oid = %oid, error = %message },
                    "handler failed on Get"
                );
                Value::NoSuchObject
            }
            result => result.into_wire_value(),
        }
    }

    async fn handle_get(&self, ctx: &RequestContext, ranges: &[SearchRange]) -> ResponsePdu {
        let mut varbinds = Vec::with_capacity(ranges.len());
        for range in ranges {
            let value = self.get_value(ctx, &range.start).await;
            varbinds.push(VarBind::new(range.start.clone(), value));
        }
        ResponsePdu::ok(varbinds)
    }

    async fn handle_get_next(&self, ctx: &RequestContext, ranges: &[SearchRange]) -> ResponsePdu {
        let mut varbinds = Vec::with_capacity(ranges.len());
        for range in ranges {
            varbinds.push(self.next_in_range(ctx, range).await);
        }
        ResponsePdu::ok(varbinds)
    }

    async fn handle_get_bulk(&self, ctx: &RequestContext, bulk: &GetBulkPdu) -> ResponsePdu {
        let non_repeaters = usize::from(bulk.non_repeaters).min(bulk.ranges.len());
        let (singles, repeaters) = bulk.ranges.split_at(non_repeaters);
        let mut varbinds = Vec::with_capacity(
            singles.len() + repeaters.len() * usize::from(bulk.max_repetitions),
        );

        for range in singles {
            varbinds.push(self.next_in_range(ctx, range).await);
        }

        let mut cursors: Vec<SearchRange> = repeaters.to_vec();
        let mut exhausted = vec![false; cursors.len()];
        for _ in 0..bulk.max_repetitions {
            if cursors.is_empty() {
                break;
            }
            let mut all_exhausted = true;
            for (cursor, done) in cursors.iter_mut().zip(exhausted.iter_mut()) {
                if *done {
                    varbinds.push(VarBind::new(cursor.start.clone(), Value::EndOfMibView));
                    continue;
                }
                let vb = self.next_in_range(ctx, cursor).await;
                if matches!(vb.value, Value::EndOfMibView) {
                    *done = true;
                } else {
                    all_exhausted = false;
                    cursor.start = vb.oid.clone();
                    cursor.include = false;
                }
                varbinds.push(vb);
            }
            if all_exhausted {
                break;
            }
        }
        ResponsePdu::ok(varbinds)
    }

    /// One GetNext step over `range`, `endOfMibView` named with the start
    /// OID when the range holds nothing more.
    async fn next_in_range(&self, ctx: &RequestContext, range: &SearchRange) -> VarBind {
        if range.include && range.below_end(&range.start) {
            let value = self.get_value(ctx, &range.start).await;
            if !value.is_exception() {
                return VarBind::new(range.start.clone(), value);
            }
        }
        match self.next_after(ctx, &range.start, range).await {
            Some(vb) => vb,
            None => VarBind::new(range.start.clone(), Value::EndOfMibView),
        }
    }

    async fn next_after(&self, ctx: &RequestContext, after: &Oid, range: &SearchRange) -> Option<VarBind> {
        let mut best: Option<VarBind> = None;
        for (floor, entry) in self.candidates(ctx, after) {
            if !range.below_end(&floor) || best.as_ref().is_some_and(|b| floor >= b.oid) {
                break;
            }
            if !entry.registration.handler.capabilities().get_next {
                continue;
            }
            let limit = best.as_ref().map(|b| b.oid.clone());
            if let Some(vb) = self.next_in_entry(ctx, &entry, after, range, limit.as_ref()).await {
                best = Some(vb);
            }
        }
        best
    }

    /// Ask one registration's handler for its successor of `after`,
    /// skipping results that another registration owns.
    async fn next_in_entry(
        &self,
        ctx: &RequestContext,
        entry: &Arc<Entry>,
        after: &Oid,
        range: &SearchRange,
        limit: Option<&Oid>,
    ) -> Option<VarBind> {
        let handler = &entry.registration.handler;
        let mut from = after.clone();
        loop {
            let vb = match handler.get_next(ctx, entry.anchor(), &from).await {
                GetNextResult::Value(vb) => vb,
                GetNextResult::EndOfMibView => return None,
                GetNextResult::Failed(message) => {
                    tracing::warn!(
                        target: "async_agentx::agent",
                        { agentx.oid = %from, agentx.registration = %entry.id, error = %message },
                        "handler failed on GetNext"
                    );
                    return None;
                }
            };

            if vb.oid <= from {
                tracing::warn!(
                    target: "async_agentx::agent",
                    { agentx.oid = %from, agentx.returned = %vb.oid, agentx.registration = %entry.id },
                    "handler GetNext did not advance"
                );
                return None;
            }
            if !range.below_end(&vb.oid) || limit.is_some_and(|l| vb.oid >= *l) {
                return None;
            }

            let registration = &entry.registration;
            if registration.covers(&vb.oid) {
                match self.resolve(ctx, &vb.oid) {
                    Some(owner) if owner.id == entry.id => {
                        if !vb.value.is_exception() {
                            return Some(vb);
                        }
                    }
                    // This entry owns nothing below a more specific owner
                    Some(owner) => {
                        from = owner.registration.last_covered(&vb.oid);
                        continue;
                    }
                    None => {}
                }
            } else if registration.search_floor(&vb.oid).is_none() {
                // Past everything this registration covers
                return None;
            }
            from = vb.oid;
        }
    }
}
