//! AgentX session with the master agent.
//!
//! A [`Session`] owns one connection to the master and runs four tasks on
//! it:
//!
//! - the **reader** decodes frames, completes our pending requests from
//!   Response PDUs and queues everything else for the dispatcher;
//! - the **dispatcher** processes master requests one at a time and owns
//!   the Set transactions;
//! - the **writer** is the only task touching the socket's write half;
//! - the **pinger** sends keepalive Pings and declares the session lost
//!   after too many go unanswered.
//!
//! All four observe one cancellation token. Once the session leaves
//! [`SessionState::Open`] it never comes back; open a new one to reconnect.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_agentx::handler::ScalarCell;
//! use async_agentx::pdu::CloseReason;
//! use async_agentx::session::SessionBuilder;
//! use async_agentx::oid;
//!
//! # async fn example() -> async_agentx::Result<()> {
//! let session = SessionBuilder::new().description("demo").connect().await?;
//!
//! let answer = Arc::new(ScalarCell::integer32(oid!(1, 3, 6, 1, 4, 1, 99999, 1, 0), 42));
//! session.register_cell(answer.clone()).await?;
//!
//! answer.update(43)?;
//! session.close(CloseReason::Shutdown).await?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod state;

pub use builder::{DEFAULT_PING_INTERVAL, SessionBuilder};
pub use state::SessionState;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::io::AsyncRead;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::agent::Dispatcher;
use crate::codec::{Flags, Header};
use crate::error::{
    Error, LostReason, ProtocolErrorKind, RegistrationErrorKind, ResponseError, Result,
};
use crate::handler::{MibHandler, ScalarCell, ScalarHandler, ScalarKind, TableHandler};
use crate::oid::Oid;
use crate::pdu::{AgentCapsPdu, ClosePdu, CloseReason, OpenPdu, Pdu, PduBody, ResponsePdu};
use crate::registry::{MibRegistry, Registration, RegistrationId};
use crate::transport::{AgentxStream, Egress, FrameReader, egress_channel, run_writer};
use crate::value::Value;
use crate::varbind::VarBind;

use builder::SessionConfig;

/// Frames that may wait for the writer before senders block.
const EGRESS_CAPACITY: usize = 64;

/// Master requests that may wait for the dispatcher.
const REQUEST_QUEUE: usize = 32;

/// Type and current value of one registered scalar cell.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredValue {
    pub oid: Oid,
    pub kind: ScalarKind,
    pub value: Value,
}

/// How the master should choose index values in
/// [`Session::index_allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexAllocation {
    /// Allocate exactly the values given.
    #[default]
    Specific,
    /// Any value not allocated before in this master's lifetime.
    New,
    /// Any value not currently allocated.
    Any,
}

impl IndexAllocation {
    fn flags(self) -> Flags {
        match self {
            Self::Specific => Flags::empty(),
            Self::New => Flags::NEW_INDEX,
            Self::Any => Flags::ANY_INDEX,
        }
    }
}

struct PendingRequest {
    transaction_id: u32,
    sender: oneshot::Sender<(u32, ResponsePdu)>,
}

struct Inner {
    config: SessionConfig,
    session_id: AtomicU32,
    next_packet_id: AtomicU32,
    egress: Egress,
    pending: Mutex<HashMap<u32, PendingRequest>>,
    registry: Arc<RwLock<MibRegistry>>,
    cells: Mutex<Vec<(RegistrationId, Arc<ScalarCell>)>>,
    state: watch::Sender<SessionState>,
    /// Why the session ended, set once; `None` for a local close.
    cause: OnceLock<Option<LostReason>>,
    cancel: CancellationToken,
}

/// Handle to an open AgentX session.
///
/// Cheap to clone; every clone drives the same session. Dropping the
/// handles does not close the session, call [`close`](Self::close).
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub(crate) async fn open<S: AgentxStream>(stream: S, config: SessionConfig) -> Result<Self> {
        let (read, write) = tokio::io::split(stream);
        let (egress, egress_rx) = egress_channel(EGRESS_CAPACITY);
        let (state, _) = watch::channel(SessionState::Opening);
        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE);
        let frames = FrameReader::new(read, config.max_frame_size);

        let inner = Arc::new(Inner {
            config,
            session_id: AtomicU32::new(0),
            next_packet_id: AtomicU32::new(1),
            egress,
            pending: Mutex::new(HashMap::new()),
            registry: Arc::new(RwLock::new(MibRegistry::new())),
            cells: Mutex::new(Vec::new()),
            state,
            cause: OnceLock::new(),
            cancel: CancellationToken::new(),
        });

        let writer = Arc::clone(&inner);
        tokio::spawn(async move {
            if let Err(e) = run_writer(write, egress_rx, writer.cancel.clone()).await {
                tracing::warn!(target: "async_agentx::session", { error = %e }, "write to master failed");
                writer.shutdown(Some(LostReason::Disconnected));
            }
        });
        tokio::spawn(Arc::clone(&inner).read_loop(frames, request_tx));
        let dispatcher = Dispatcher::new(Arc::clone(&inner.registry));
        tokio::spawn(Arc::clone(&inner).dispatch_loop(dispatcher, request_rx));

        let open = OpenPdu {
            timeout: inner.config.timeout_secs(),
            id: inner.config.id.clone(),
            description: Bytes::from(inner.config.description.clone()),
        };
        let (session_id, response) =
            match inner.round_trip(PduBody::Open(open), None, Flags::empty()).await {
                Ok(answer) => answer,
                Err(e) => {
                    inner.shutdown(None);
                    return Err(e);
                }
            };
        if !response.error.is_ok() {
            tracing::info!(
                target: "async_agentx::session",
                { agentx.error = %response.error },
                "master refused Open"
            );
            inner.shutdown(None);
            return Err(Error::OpenFailed {
                status: response.error,
            });
        }

        inner.session_id.store(session_id, Ordering::Release);
        inner.state.send_replace(SessionState::Open);
        tracing::info!(
            target: "async_agentx::session",
            { agentx.session_id = session_id, agentx.description = %inner.config.description },
            "session open"
        );
        tokio::spawn(Arc::clone(&inner).ping_loop());

        Ok(Self { inner })
    }

    /// Session id assigned by the master, 0 before Open completes.
    pub fn session_id(&self) -> u32 {
        self.inner.session_id.load(Ordering::Acquire)
    }

    pub fn state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Wait until the session is closed.
    ///
    /// Returns `Ok` after a local [`close`](Self::close) and
    /// `SessionLost` when the master or the connection ended it.
    pub async fn wait_closed(&self) -> Result<()> {
        let mut rx = self.inner.state.subscribe();
        // The sender lives in `inner`, which `self` keeps alive
        let _ = rx.wait_for(|s| *s == SessionState::Closed).await;
        match self.inner.cause.get() {
            Some(Some(reason)) => Err(Error::SessionLost { reason: *reason }),
            _ => Ok(()),
        }
    }

    /// Close the session.
    ///
    /// Open Set transactions are undone and cleaned up before this returns.
    pub async fn close(&self, reason: CloseReason) -> Result<()> {
        let was_open = self.inner.state.send_if_modified(|state| {
            if state.is_open() {
                *state = SessionState::Closing;
                true
            } else {
                false
            }
        });
        if !was_open {
            return Err(Error::NotOpen);
        }
        tracing::info!(
            target: "async_agentx::session",
            { agentx.session_id = self.session_id(), reason = %reason },
            "closing session"
        );

        let answer = self
            .inner
            .round_trip(PduBody::Close(ClosePdu { reason }), None, Flags::empty())
            .await;
        if let Err(e) = answer {
            tracing::debug!(target: "async_agentx::session", { error = %e }, "no answer to Close");
        }
        self.inner.shutdown(None);
        self.wait_closed().await
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state().is_open() {
            Ok(())
        } else {
            Err(self.inner.terminal_error())
        }
    }

    /// Register a part of the MIB with the master.
    ///
    /// The registration is active locally before the Register PDU goes
    /// out, so the master may query it as soon as it answers. A refused
    /// registration is removed again; duplicates fail with
    /// [`RegistrationErrorKind::Duplicate`].
    pub async fn register(&self, registration: Registration) -> Result<RegistrationId> {
        self.ensure_open()?;
        let subtree = registration.subtree.clone();
        let id = self.inner.write_registry().insert(registration)?;
        let Some(entry) = self.inner.read_registry().get(id) else {
            return Err(Error::registration(subtree, RegistrationErrorKind::UnknownRegistration));
        };
        let reg = &entry.registration;

        let answer = self
            .inner
            .request(
                PduBody::Register(reg.to_register_pdu()),
                reg.context.clone(),
                reg.flags(),
            )
            .await;
        let refusal = match answer {
            Ok(resp) if resp.error.is_ok() => {
                tracing::info!(
                    target: "async_agentx::session",
                    {
                        agentx.session_id = self.session_id(),
                        agentx.subtree = %reg.subtree,
                        agentx.priority = reg.priority,
                        agentx.registration = %id,
                    },
                    "registered"
                );
                return Ok(id);
            }
            Ok(resp) if resp.error == ResponseError::DuplicateRegistration => {
                Error::registration(subtree, RegistrationErrorKind::Duplicate)
            }
            Ok(resp) => Error::registration(subtree, RegistrationErrorKind::Rejected(resp.error)),
            Err(e) => e,
        };
        self.inner.write_registry().remove(id);
        tracing::info!(
            target: "async_agentx::session",
            { agentx.subtree = %reg.subtree, error = %refusal },
            "registration refused"
        );
        Err(refusal)
    }

    /// Register a scalar instance at `oid` with the session's default
    /// priority.
    pub async fn register_scalar(
        &self,
        oid: Oid,
        handler: Arc<dyn ScalarHandler>,
    ) -> Result<RegistrationId> {
        let priority = self.inner.config.default_priority;
        self.register(Registration::scalar(oid, handler).priority(priority))
            .await
    }

    /// Register a [`ScalarCell`] at its own OID and include it in
    /// [`registered_values`](Self::registered_values).
    pub async fn register_cell(&self, cell: Arc<ScalarCell>) -> Result<RegistrationId> {
        let id = self
            .register_scalar(cell.oid().clone(), Arc::clone(&cell) as Arc<dyn ScalarHandler>)
            .await?;
        self.inner.lock_cells().push((id, cell));
        Ok(id)
    }

    /// Register every column of the table whose entry OID is `entry`.
    pub async fn register_table(
        &self,
        entry: Oid,
        handler: Arc<dyn TableHandler>,
    ) -> Result<RegistrationId> {
        let priority = self.inner.config.default_priority;
        self.register(Registration::table(entry, handler).priority(priority))
            .await
    }

    /// Register a free-form handler for the subtree at `oid`.
    pub async fn register_subtree(
        &self,
        oid: Oid,
        handler: Arc<dyn MibHandler>,
    ) -> Result<RegistrationId> {
        let priority = self.inner.config.default_priority;
        self.register(Registration::subtree(oid, handler).priority(priority))
            .await
    }

    /// Withdraw a registration.
    ///
    /// It stops being served locally right away, whatever the master answers.
    pub async fn unregister(&self, id: RegistrationId) -> Result<()> {
        self.ensure_open()?;
        let Some(entry) = self.inner.write_registry().remove(id) else {
            return Err(Error::registration(
                Oid::empty(),
                RegistrationErrorKind::UnknownRegistration,
            ));
        };
        self.inner.lock_cells().retain(|(cell_id, _)| *cell_id != id);

        let reg = &entry.registration;
        let resp = self
            .inner
            .request(
                PduBody::Unregister(reg.to_unregister_pdu()),
                reg.context.clone(),
                Flags::empty(),
            )
            .await?;
        if !resp.error.is_ok() {
            return Err(Error::registration(
                reg.subtree.clone(),
                RegistrationErrorKind::Rejected(resp.error),
            ));
        }
        tracing::info!(
            target: "async_agentx::session",
            { agentx.subtree = %reg.subtree, agentx.registration = %id },
            "unregistered"
        );
        Ok(())
    }

    /// Number of active registrations.
    pub fn registration_count(&self) -> usize {
        self.inner.read_registry().len()
    }

    /// Type and value of every cell registered with
    /// [`register_cell`](Self::register_cell), in registration order.
    pub fn registered_values(&self) -> Vec<RegisteredValue> {
        self.inner
            .lock_cells()
            .iter()
            .map(|(_, cell)| RegisteredValue {
                oid: cell.oid().clone(),
                kind: cell.kind(),
                value: cell.value(),
            })
            .collect()
    }

    /// Send a notification.
    ///
    /// RFC 2741 expects the list to start with `snmpTrapOID.0`, optionally
    /// preceded by `sysUpTime.0`.
    pub async fn notify(&self, varbinds: Vec<VarBind>) -> Result<()> {
        self.ensure_open()?;
        let resp = self
            .inner
            .request(PduBody::Notify(varbinds), None, Flags::empty())
            .await?;
        accepted(resp).map(|_| ())
    }

    /// Ask the master to allocate index values; returns the values it chose.
    pub async fn index_allocate(
        &self,
        varbinds: Vec<VarBind>,
        mode: IndexAllocation,
    ) -> Result<Vec<VarBind>> {
        self.ensure_open()?;
        let resp = self
            .inner
            .request(PduBody::IndexAllocate(varbinds), None, mode.flags())
            .await?;
        accepted(resp).map(|resp| resp.varbinds)
    }

    pub async fn index_deallocate(&self, varbinds: Vec<VarBind>) -> Result<()> {
        self.ensure_open()?;
        let resp = self
            .inner
            .request(PduBody::IndexDeallocate(varbinds), None, Flags::empty())
            .await?;
        accepted(resp).map(|_| ())
    }

    /// Advertise an AGENT-CAPABILITIES statement.
    pub async fn add_agent_caps(&self, id: Oid, description: impl Into<Bytes>) -> Result<()> {
        self.ensure_open()?;
        let caps = AgentCapsPdu {
            id,
            description: description.into(),
        };
        let resp = self
            .inner
            .request(PduBody::AddAgentCaps(caps), None, Flags::empty())
            .await?;
        accepted(resp).map(|_| ())
    }

    pub async fn remove_agent_caps(&self, id: Oid) -> Result<()> {
        self.ensure_open()?;
        let resp = self
            .inner
            .request(PduBody::RemoveAgentCaps(id), None, Flags::empty())
            .await?;
        accepted(resp).map(|_| ())
    }

    /// Ping the master and return the round-trip time.
    pub async fn ping(&self) -> Result<Duration> {
        self.ensure_open()?;
        let start = Instant::now();
        let resp = self
            .inner
            .request(PduBody::Ping, None, Flags::empty())
            .await?;
        accepted(resp).map(|_| start.elapsed())
    }
}

fn accepted(resp: ResponsePdu) -> Result<ResponsePdu> {
    if resp.error.is_ok() {
        Ok(resp)
    } else {
        Err(Error::protocol(ProtocolErrorKind::ErrorResponse {
            status: resp.error,
            index: resp.index,
        }))
    }
}

impl Inner {
    fn lock_pending(&self) -> MutexGuard<'_, HashMap<u32, PendingRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_cells(&self) -> MutexGuard<'_, Vec<(RegistrationId, Arc<ScalarCell>)>> {
        self.cells.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_registry(&self) -> std::sync::RwLockReadGuard<'_, MibRegistry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_registry(&self) -> std::sync::RwLockWriteGuard<'_, MibRegistry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn terminal_error(&self) -> Error {
        match self.cause.get() {
            Some(Some(reason)) => Error::SessionLost { reason: *reason },
            _ => Error::NotOpen,
        }
    }

    fn header_flags(&self, extra: Flags) -> Flags {
        Flags::for_order(self.config.byte_order).with(extra)
    }

    async fn request(
        &self,
        body: PduBody,
        context: Option<Bytes>,
        flags: Flags,
    ) -> Result<ResponsePdu> {
        self.round_trip(body, context, flags)
            .await
            .map(|(_, resp)| resp)
    }

    /// Send one request and wait for its Response, returning the session id
    /// from the response header along with the body.
    async fn round_trip(
        &self,
        body: PduBody,
        context: Option<Bytes>,
        flags: Flags,
    ) -> Result<(u32, ResponsePdu)> {
        let packet_id = self.next_packet_id.fetch_add(1, Ordering::Relaxed);
        let mut pdu = Pdu::new(body);
        pdu.header.flags = self.header_flags(flags);
        pdu.header.session_id = self.session_id.load(Ordering::Acquire);
        pdu.header.transaction_id = packet_id;
        pdu.header.packet_id = packet_id;
        pdu.context = context;
        let frame = pdu.encode()?;

        let (tx, rx) = oneshot::channel();
        self.lock_pending().insert(
            packet_id,
            PendingRequest {
                transaction_id: packet_id,
                sender: tx,
            },
        );
        tracing::debug!(
            target: "async_agentx::session",
            { agentx.pdu_type = %pdu.pdu_type(), agentx.packet_id = packet_id },
            "sending request"
        );
        if self.egress.send(frame).await.is_err() {
            self.lock_pending().remove(&packet_id);
            return Err(self.terminal_error());
        }

        let start = Instant::now();
        match tokio::time::timeout(self.config.request_timeout, rx).await {
            Ok(Ok(answer)) => Ok(answer),
            // Dropped by shutdown
            Ok(Err(_)) => Err(self.terminal_error()),
            Err(_) => {
                self.lock_pending().remove(&packet_id);
                Err(Error::Timeout {
                    packet_id,
                    elapsed: start.elapsed(),
                })
            }
        }
    }

    /// Queue a Close without waiting for an answer.
    async fn send_close(&self, reason: CloseReason) {
        let mut pdu = Pdu::new(PduBody::Close(ClosePdu { reason }));
        pdu.header.flags = self.header_flags(Flags::empty());
        pdu.header.session_id = self.session_id.load(Ordering::Acquire);
        pdu.header.packet_id = self.next_packet_id.fetch_add(1, Ordering::Relaxed);
        pdu.header.transaction_id = pdu.header.packet_id;
        if let Ok(frame) = pdu.encode() {
            let _ = self.egress.send(frame).await;
        }
    }

    /// Begin teardown. Only the first call has any effect.
    fn shutdown(&self, cause: Option<LostReason>) {
        if self.cause.set(cause).is_err() {
            return;
        }
        self.state.send_if_modified(|state| {
            if *state == SessionState::Closed {
                false
            } else {
                *state = SessionState::Closing;
                true
            }
        });
        self.cancel.cancel();
        // Waiters see their sender dropped
        self.lock_pending().clear();

        let session_id = self.session_id.load(Ordering::Acquire);
        match cause {
            Some(reason) => tracing::warn!(
                target: "async_agentx::session",
                { agentx.session_id = session_id, reason = %reason },
                "session lost"
            ),
            None => tracing::debug!(
                target: "async_agentx::session",
                { agentx.session_id = session_id },
                "session shutting down"
            ),
        }
    }

    fn complete(&self, header: &Header, resp: ResponsePdu) {
        let ours = self.session_id.load(Ordering::Acquire);
        let mut pending = self.lock_pending();
        let matched = (ours == 0 || header.session_id == ours)
            && pending
                .get(&header.packet_id)
                .is_some_and(|p| p.transaction_id == header.transaction_id);
        if !matched {
            tracing::debug!(
                target: "async_agentx::session",
                {
                    agentx.session_id = header.session_id,
                    agentx.transaction_id = header.transaction_id,
                    agentx.packet_id = header.packet_id,
                },
                "discarding unmatched response"
            );
            return;
        }
        if let Some(waiter) = pending.remove(&header.packet_id) {
            let _ = waiter.sender.send((header.session_id, resp));
        }
    }

    async fn read_loop<R>(self: Arc<Self>, mut frames: FrameReader<R>, requests: mpsc::Sender<Pdu>)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let cause = loop {
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => return,
                frame = frames.read_frame() => frame,
            };
            let frame = match frame {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::debug!(target: "async_agentx::session", "master closed the connection");
                    break LostReason::Disconnected;
                }
                Err(e @ Error::Parse { .. }) => {
                    tracing::warn!(target: "async_agentx::session", { error = %e }, "unreadable frame");
                    self.send_close(CloseReason::ParseError).await;
                    break LostReason::ParseError;
                }
                Err(e) => {
                    tracing::warn!(target: "async_agentx::session", { error = %e }, "read from master failed");
                    break LostReason::Disconnected;
                }
            };

            let pdu = match Pdu::decode(frame) {
                Ok(pdu) => pdu,
                Err(e) => {
                    tracing::warn!(target: "async_agentx::session", { error = %e }, "malformed PDU");
                    self.send_close(CloseReason::ParseError).await;
                    break LostReason::ParseError;
                }
            };
            match pdu.body {
                PduBody::Response(resp) => self.complete(&pdu.header, resp),
                PduBody::Close(close) => {
                    tracing::info!(
                        target: "async_agentx::session",
                        { agentx.session_id = pdu.header.session_id, reason = %close.reason },
                        "master closed the session"
                    );
                    break LostReason::ClosedByMaster(close.reason);
                }
                _ if pdu.header.session_id != self.session_id.load(Ordering::Acquire) => {
                    tracing::debug!(
                        target: "async_agentx::session",
                        {
                            agentx.session_id = pdu.header.session_id,
                            agentx.pdu_type = %pdu.header.pdu_type,
                            agentx.packet_id = pdu.header.packet_id,
                        },
                        "request for another session, answering notOpen"
                    );
                    let refusal = ResponsePdu::error(ResponseError::NotOpen, 0);
                    if let Ok(frame) = self.response_frame(&pdu.header, refusal)
                        && self.egress.send(frame).await.is_err()
                    {
                        return;
                    }
                }
                body => {
                    let request = Pdu {
                        header: pdu.header,
                        context: pdu.context,
                        body,
                    };
                    if requests.send(request).await.is_err() {
                        return;
                    }
                }
            }
        };
        self.shutdown(Some(cause));
    }

    async fn dispatch_loop(
        self: Arc<Self>,
        mut dispatcher: Dispatcher,
        mut requests: mpsc::Receiver<Pdu>,
    ) {
        loop {
            let pdu = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                pdu = requests.recv() => match pdu {
                    Some(pdu) => pdu,
                    None => break,
                },
            };
            let Some(body) = dispatcher.dispatch(&pdu).await else {
                continue;
            };
            let frame = match self.response_frame(&pdu.header, body) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(
                        target: "async_agentx::session",
                        { agentx.packet_id = pdu.header.packet_id, error = %e },
                        "response not encodable, answering genErr"
                    );
                    match self.response_frame(&pdu.header, ResponsePdu::error(ResponseError::GenErr, 0)) {
                        Ok(frame) => frame,
                        Err(_) => continue,
                    }
                }
            };
            if self.egress.send(frame).await.is_err() {
                break;
            }
        }

        self.shutdown(Some(LostReason::Disconnected));
        let open = dispatcher.open_transactions();
        if open > 0 {
            tracing::debug!(
                target: "async_agentx::session",
                { open_transactions = open },
                "aborting open transactions"
            );
        }
        dispatcher.abort_all().await;
        self.state.send_replace(SessionState::Closed);
        tracing::info!(
            target: "async_agentx::session",
            { agentx.session_id = self.session_id.load(Ordering::Acquire) },
            "session closed"
        );
    }

    fn response_frame(&self, request: &Header, body: ResponsePdu) -> Result<Bytes> {
        let mut pdu = Pdu::new(PduBody::Response(body));
        pdu.header.flags = self.header_flags(Flags::empty());
        pdu.header.session_id = request.session_id;
        pdu.header.transaction_id = request.transaction_id;
        pdu.header.packet_id = request.packet_id;
        pdu.encode()
    }

    async fn ping_loop(self: Arc<Self>) {
        let mut missed = 0u32;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(self.config.ping_interval) => {}
            }
            match self.request(PduBody::Ping, None, Flags::empty()).await {
                Ok(_) => missed = 0,
                Err(Error::Timeout { packet_id, .. }) => {
                    missed += 1;
                    tracing::warn!(
                        target: "async_agentx::session",
                        { agentx.packet_id = packet_id, missed, max = self.config.max_missed_pings },
                        "ping unanswered"
                    );
                    if missed >= self.config.max_missed_pings {
                        self.send_close(CloseReason::Timeouts).await;
                        self.shutdown(Some(LostReason::MissedPings { count: missed }));
                        return;
                    }
                }
                Err(_) => return,
            }
        }
    }
}
