//! Two-phase Set transactions (RFC 2741 §7.2.4).
//!
//! The master drives a Set through separate PDUs, so the state between
//! them lives in a per-transaction record owned by the dispatcher:
//!
//! 1. **TestSet** validates every VarBind. Nothing changes yet.
//! 2. **CommitSet** applies them in order, reading each old value first.
//! 3. **UndoSet** reverts committed VarBinds in reverse order.
//! 4. **CleanupSet** ends the transaction, successful or not.

use std::sync::Arc;

use crate::error::ResponseError;
use crate::handler::{RequestContext, SetResult};
use crate::oid::Oid;
use crate::pdu::ResponsePdu;
use crate::registry::Entry;
use crate::value::Value;
use crate::varbind::VarBind;

use super::Dispatcher;

/// Where a transaction stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Every VarBind passed TestSet.
    Tested,
    /// TestSet refused a VarBind; only CleanupSet is meaningful now.
    Failed,
    /// CommitSet ran, possibly stopping part way.
    Committed,
}

#[derive(Debug)]
struct PendingSet {
    oid: Oid,
    value: Value,
    entry: Arc<Entry>,
    /// Value read just before the commit, restored by undo.
    previous: Option<Value>,
    committed: bool,
}

/// State carried from TestSet to CleanupSet for one transaction.
#[derive(Debug)]
pub struct PendingSetTransaction {
    pub transaction_id: u32,
    pub phase: Phase,
    ctx: RequestContext,
    entries: Vec<PendingSet>,
}

impl PendingSetTransaction {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn undo(&mut self, ctx: &RequestContext) {
        for pending in self.entries.iter_mut().rev().filter(|p| p.committed) {
            let handler = &pending.entry.registration.handler;
            let result = handler
                .undo_set(ctx, pending.entry.anchor(), &pending.oid, pending.previous.as_ref())
                .await;
            if !result.is_ok() {
                tracing::warn!(
                    target: "async_agentx::agent",
                    {
                        agentx.transaction_id = self.transaction_id,
                        agentx.oid = %pending.oid,
                        result = ?result,
                    },
                    "undo failed"
                );
            }
            pending.committed = false;
        }
    }

    async fn cleanup(&self, ctx: &RequestContext) {
        for pending in &self.entries {
            let handler = &pending.entry.registration.handler;
            handler
                .cleanup_set(ctx, pending.entry.anchor(), &pending.oid)
                .await;
        }
    }
}

fn refused(result: SetResult, index: usize) -> ResponsePdu {
    ResponsePdu::error(result.to_response_error(), wire_index(index))
}

/// 1-based VarBind index as carried in `res.index`.
fn wire_index(index: usize) -> u16 {
    u16::try_from(index + 1).unwrap_or(u16::MAX)
}

impl Dispatcher {
    pub(super) async fn handle_test_set(
        &mut self,
        ctx: &RequestContext,
        varbinds: &[VarBind],
    ) -> ResponsePdu {
        if let Some(mut stale) = self.transactions.remove(&ctx.transaction_id) {
            tracing::debug!(
                target: "async_agentx::agent",
                { agentx.transaction_id = ctx.transaction_id },
                "TestSet reuses an open transaction, cleaning up the old one"
            );
            stale.undo(ctx).await;
            stale.cleanup(ctx).await;
        }

        let mut txn = PendingSetTransaction {
            transaction_id: ctx.transaction_id,
            phase: Phase::Tested,
            ctx: ctx.clone(),
            entries: Vec::with_capacity(varbinds.len()),
        };
        let mut response = ResponsePdu::default();

        for (index, vb) in varbinds.iter().enumerate() {
            let entry = match self.resolve(ctx, &vb.oid) {
                Some(entry) if entry.registration.handler.capabilities().set => entry,
                _ => {
                    response = refused(SetResult::NotWritable, index);
                    break;
                }
            };

            let result = entry
                .registration
                .handler
                .test_set(ctx, entry.anchor(), &vb.oid, &vb.value)
                .await;
            // A refusing handler still gets its cleanup call
            txn.entries.push(PendingSet {
                oid: vb.oid.clone(),
                value: vb.value.clone(),
                entry,
                previous: None,
                committed: false,
            });
            if !result.is_ok() {
                response = refused(result, index);
                break;
            }
        }

        if !response.error.is_ok() {
            txn.phase = Phase::Failed;
            tracing::debug!(
                target: "async_agentx::agent",
                {
                    agentx.transaction_id = ctx.transaction_id,
                    agentx.error = %response.error,
                    agentx.index = response.index,
                },
                "TestSet refused"
            );
        }
        self.transactions.insert(ctx.transaction_id, txn);
        response
    }

    pub(super) async fn handle_commit_set(&mut self, ctx: &RequestContext) -> ResponsePdu {
        let Some(txn) = self.transactions.get_mut(&ctx.transaction_id) else {
            return unknown_transaction(ctx, "CommitSet");
        };
        if txn.phase != Phase::Tested {
            tracing::debug!(
                target: "async_agentx::agent",
                { agentx.transaction_id = ctx.transaction_id, phase = ?txn.phase },
                "CommitSet in wrong phase"
            );
            return ResponsePdu::error(ResponseError::ProcessingError, 0);
        }
        txn.phase = Phase::Committed;

        for (index, pending) in txn.entries.iter_mut().enumerate() {
            let handler = &pending.entry.registration.handler;
            let anchor = pending.entry.anchor();
            pending.previous = if handler.capabilities().get {
                handler.get(ctx, anchor, &pending.oid).await.into_value()
            } else {
                None
            };

            let result = handler.commit_set(ctx, anchor, &pending.oid, &pending.value).await;
            if !result.is_ok() {
                // Earlier commits stay in place until the master sends UndoSet
                tracing::warn!(
                    target: "async_agentx::agent",
                    {
                        agentx.transaction_id = ctx.transaction_id,
                        agentx.oid = %pending.oid,
                        result = ?result,
                    },
                    "commit failed"
                );
                return ResponsePdu::error(ResponseError::CommitFailed, wire_index(index));
            }
            pending.committed = true;
        }
        ResponsePdu::default()
    }

    pub(super) async fn handle_undo_set(&mut self, ctx: &RequestContext) -> ResponsePdu {
        let Some(mut txn) = self.transactions.remove(&ctx.transaction_id) else {
            return unknown_transaction(ctx, "UndoSet");
        };
        txn.undo(ctx).await;
        txn.cleanup(ctx).await;
        ResponsePdu::default()
    }

    /// Ends the transaction; there is no response to a CleanupSet.
    pub(super) async fn handle_cleanup_set(&mut self, ctx: &RequestContext) {
        match self.transactions.remove(&ctx.transaction_id) {
            Some(txn) => txn.cleanup(ctx).await,
            None => tracing::debug!(
                target: "async_agentx::agent",
                { agentx.transaction_id = ctx.transaction_id },
                "CleanupSet for unknown transaction ignored"
            ),
        }
    }

    /// Undo and clean up every open transaction, for session teardown.
    pub async fn abort_all(&mut self) {
        let open: Vec<_> = self.transactions.drain().map(|(_, txn)| txn).collect();
        for mut txn in open {
            let ctx = txn.ctx.clone();
            txn.undo(&ctx).await;
            txn.cleanup(&ctx).await;
        }
    }

    /// Number of transactions between TestSet and CleanupSet.
    pub fn open_transactions(&self) -> usize {
        self.transactions.len()
    }

    pub fn transaction(&self, transaction_id: u32) -> Option<&PendingSetTransaction> {
        self.transactions.get(&transaction_id)
    }
}

fn unknown_transaction(ctx: &RequestContext, phase: &str) -> ResponsePdu {
    tracing::debug!(
        target: "async_agentx::agent",
        { agentx.transaction_id = ctx.transaction_id, agentx.pdu_type = phase },
        "unknown transaction"
    );
    ResponsePdu::error(ResponseError::ProcessingError, 0)
}
