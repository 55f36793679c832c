//! Registration descriptor.

use std::sync::Arc;

use bytes::Bytes;

use crate::codec::Flags;
use crate::handler::{Handler, MibHandler, ScalarHandler, TableHandler};
use crate::oid::{MAX_OID_LEN, Oid};
use crate::pdu::{RegisterPdu, UnregisterPdu};

/// Priority used when none is given (RFC 2741 §6.2.3).
pub const DEFAULT_PRIORITY: u8 = 127;

/// A claim on part of the MIB, together with the handler serving it.
///
/// With `range_subid` zero the registration covers `subtree` and everything
/// below it. With `range_subid` set to a 1-based position `r`, it covers
/// every subtree obtained by replacing arc `r` of `subtree` with any value
/// from that arc up to `upper_bound` inclusive.
///
/// For a [`Handler::Table`] the subtree names the first column of the table
/// (`xxxEntry.firstColumn`); the handler is addressed relative to its
/// parent, the entry OID.
///
/// ```rust
/// use std::sync::Arc;
/// use async_agentx::handler::ScalarCell;
/// use async_agentx::registry::Registration;
/// use async_agentx::oid;
///
/// let cell = Arc::new(ScalarCell::integer32(oid!(1, 3, 6, 1, 4, 1, 99999, 1), 42));
/// let reg = Registration::scalar(oid!(1, 3, 6, 1, 4, 1, 99999, 1), cell)
///     .priority(100)
///     .context("vrf-blue");
/// assert!(reg.covers(&oid!(1, 3, 6, 1, 4, 1, 99999, 1)));
/// ```
#[derive(Debug, Clone)]
pub struct Registration {
    pub subtree: Oid,
    /// Lower is preferred when two registrations cover the same OID at the
    /// same depth.
    pub priority: u8,
    pub range_subid: u8,
    pub upper_bound: Option<u32>,
    /// Per-registration response timeout in seconds, 0 for the session's.
    pub timeout: u8,
    pub context: Option<Bytes>,
    /// Sets `INSTANCE_REGISTRATION`: the subtree names a single instance.
    pub instance: bool,
    pub handler: Handler,
}

impl Registration {
    pub fn new(subtree: Oid, handler: Handler) -> Self {
        Self {
            instance: matches!(handler, Handler::Scalar(_)),
            subtree,
            priority: DEFAULT_PRIORITY,
            range_subid: 0,
            upper_bound: None,
            timeout: 0,
            context: None,
            handler,
        }
    }

    /// Register a scalar at its instance OID.
    pub fn scalar(oid: Oid, handler: Arc<dyn ScalarHandler>) -> Self {
        Self::new(oid, Handler::Scalar(handler))
    }

    /// Register every column of a table with one range registration.
    ///
    /// `entry` is the table's entry OID. The range runs over the column arc
    /// that follows it.
    pub fn table(entry: Oid, handler: Arc<dyn TableHandler>) -> Self {
        let columns = handler.columns();
        let (first, last) = (*columns.start(), *columns.end());
        let subtree = entry.child(first);
        let mut reg = Self::new(subtree, Handler::Table(handler));
        if last > first {
            reg.range_subid = u8::try_from(entry.len() + 1).unwrap_or(0);
            reg.upper_bound = Some(last);
        }
        reg
    }

    /// Register a free-form handler for a whole subtree.
    pub fn subtree(oid: Oid, handler: Arc<dyn MibHandler>) -> Self {
        Self::new(oid, Handler::Subtree(handler))
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn timeout(mut self, seconds: u8) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn context(mut self, context: impl Into<Bytes>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Turn this into a range registration over arc `range_subid`
    /// (1-based) up to `upper_bound`.
    pub fn range(mut self, range_subid: u8, upper_bound: u32) -> Self {
        self.range_subid = range_subid;
        self.upper_bound = Some(upper_bound);
        self
    }

    /// The OID handler calls are made relative to.
    pub(crate) fn anchor(&self) -> Oid {
        match self.handler {
            Handler::Table(_) => self.subtree.parent().unwrap_or_else(Oid::empty),
            Handler::Scalar(_) | Handler::Subtree(_) => self.subtree.clone(),
        }
    }

    /// 0-based position and bounds of the ranged arc, if any.
    fn range_bounds(&self) -> Option<(usize, u32, u32)> {
        if self.range_subid == 0 {
            return None;
        }
        let pos = usize::from(self.range_subid) - 1;
        let lower = *self.subtree.arcs().get(pos)?;
        Some((pos, lower, self.upper_bound.unwrap_or(lower)))
    }

    /// The subtree with the ranged arc replaced by `value`.
    fn subtree_at(&self, pos: usize, value: u32) -> Oid {
        let mut arcs = self.subtree.arcs().to_vec();
        arcs[pos] = value;
        Oid::new(arcs)
    }

    /// True if `oid` lies inside this registration.
    pub fn covers(&self, oid: &Oid) -> bool {
        match self.range_bounds() {
            None => oid.starts_with(&self.subtree),
            Some((pos, lower, upper)) => {
                let arcs = oid.arcs();
                arcs.len() >= self.subtree.len()
                    && self.subtree.arcs().iter().enumerate().all(|(i, &arc)| {
                        if i == pos {
                            (lower..=upper).contains(&arcs[i])
                        } else {
                            arcs[i] == arc
                        }
                    })
            }
        }
    }

    /// Number of arcs that must match for `covers` to hold; the depth used
    /// to rank overlapping registrations.
    pub(crate) fn depth(&self) -> usize {
        self.subtree.len()
    }

    /// A lower bound on any covered OID greater than `after`.
    ///
    /// Returns `after` itself when it is covered, otherwise the first
    /// covered subtree root past it, or `None` when nothing covered lies
    /// beyond `after`.
    pub(crate) fn search_floor(&self, after: &Oid) -> Option<Oid> {
        if self.covers(after) {
            return Some(after.clone());
        }
        let Some((pos, lower, upper)) = self.range_bounds() else {
            return (&self.subtree > after).then(|| self.subtree.clone());
        };

        let prefix = &self.subtree.arcs()[..pos];
        let after_arcs = after.arcs();
        let shared = after_arcs.len().min(pos);
        match after_arcs[..shared].cmp(&prefix[..shared]) {
            std::cmp::Ordering::Less => return Some(self.subtree.clone()),
            std::cmp::Ordering::Greater => return None,
            std::cmp::Ordering::Equal => {}
        }
        if after_arcs.len() <= pos {
            // `after` is a proper prefix of every covered subtree
            return Some(self.subtree.clone());
        }

        let arc = after_arcs[pos];
        if arc < lower {
            return Some(self.subtree.clone());
        }
        if arc > upper {
            return None;
        }
        let candidate = self.subtree_at(pos, arc);
        if &candidate > after {
            Some(candidate)
        } else if arc < upper {
            Some(self.subtree_at(pos, arc + 1))
        } else {
            None
        }
    }

    /// The greatest OID of the covered subtree holding `oid`, assuming
    /// [`covers`](Self::covers) holds for it.
    ///
    /// Every covered OID past this one lies in a different subtree of a
    /// range registration, or in none.
    pub(crate) fn last_covered(&self, oid: &Oid) -> Oid {
        let depth = self.subtree.len().min(oid.len());
        let mut arcs = oid.arcs()[..depth].to_vec();
        arcs.resize(MAX_OID_LEN, u32::MAX);
        Oid::new(arcs)
    }

    pub(crate) fn flags(&self) -> Flags {
        if self.instance {
            Flags::INSTANCE_REGISTRATION
        } else {
            Flags::empty()
        }
    }

    pub(crate) fn to_register_pdu(&self) -> RegisterPdu {
        RegisterPdu {
            timeout: self.timeout,
            priority: self.priority,
            range_subid: self.range_subid,
            subtree: self.subtree.clone(),
            upper_bound: self.upper_bound.filter(|_| self.range_subid != 0),
        }
    }

    pub(crate) fn to_unregister_pdu(&self) -> UnregisterPdu {
        UnregisterPdu {
            priority: self.priority,
            range_subid: self.range_subid,
            subtree: self.subtree.clone(),
            upper_bound: self.upper_bound.filter(|_| self.range_subid != 0),
        }
    }
}
