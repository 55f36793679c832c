//! Typed scalar cells.
//!
//! A [`ScalarCell`] is a scalar handler holding its own value: the
//! application keeps an `Arc` to it and calls [`update`](ScalarCell::update)
//! whenever the underlying quantity changes, while the master reads it
//! through the session. Cells are read-only unless built with
//! [`writable`](ScalarCell::writable).
//!
//! ```rust
//! use async_agentx::handler::ScalarCell;
//! use async_agentx::{Value, oid};
//!
//! let hits = ScalarCell::counter32(oid!(1, 3, 6, 1, 4, 1, 99999, 2, 0), 0);
//! hits.increment(2).unwrap();
//! assert_eq!(hits.value(), Value::Counter32(2));
//!
//! // Wrong type for the cell
//! assert!(hits.update(Value::Integer(5)).is_err());
//! ```

use std::net::Ipv4Addr;
use std::sync::{PoisonError, RwLock};

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::value::Value;

use super::{BoxFuture, Capabilities, GetResult, RequestContext, ScalarHandler, SetResult};

/// Longest string a string cell accepts, in bytes.
pub const MAX_STRING_SIZE: usize = 1024;

/// The SMI type a cell is fixed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Integer32,
    Unsigned32,
    Counter32,
    Counter64,
    TimeTicks,
    IpAddress,
    OctetString,
    /// UTF-8 text carried as an OCTET STRING.
    DisplayString,
}

impl ScalarKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Integer32 => "Integer32",
            ScalarKind::Unsigned32 => "Unsigned32",
            ScalarKind::Counter32 => "Counter32",
            ScalarKind::Counter64 => "Counter64",
            ScalarKind::TimeTicks => "TimeTicks",
            ScalarKind::IpAddress => "IpAddress",
            ScalarKind::OctetString => "OctetString",
            ScalarKind::DisplayString => "DisplayString",
        }
    }

    fn check(&self, value: &Value) -> SetResult {
        match (self, value) {
            (ScalarKind::Integer32, Value::Integer(_))
            | (ScalarKind::Unsigned32, Value::Gauge32(_))
            | (ScalarKind::Counter32, Value::Counter32(_))
            | (ScalarKind::Counter64, Value::Counter64(_))
            | (ScalarKind::TimeTicks, Value::TimeTicks(_))
            | (ScalarKind::IpAddress, Value::IpAddress(_)) => SetResult::Ok,
            (ScalarKind::OctetString, Value::OctetString(data)) => {
                if data.len() > MAX_STRING_SIZE {
                    SetResult::WrongLength
                } else {
                    SetResult::Ok
                }
            }
            (ScalarKind::DisplayString, Value::OctetString(data)) => {
                if data.len() > MAX_STRING_SIZE {
                    SetResult::WrongLength
                } else if std::str::from_utf8(data).is_err() {
                    SetResult::WrongValue
                } else {
                    SetResult::Ok
                }
            }
            _ => SetResult::WrongType,
        }
    }
}

impl std::fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A scalar object instance with a value of one fixed kind.
#[derive(Debug)]
pub struct ScalarCell {
    oid: Oid,
    kind: ScalarKind,
    writable: bool,
    value: RwLock<Value>,
}

impl ScalarCell {
    /// Create a cell, checking that `initial` matches `kind`.
    pub fn new(oid: Oid, kind: ScalarKind, initial: Value) -> Result<Self> {
        match kind.check(&initial) {
            SetResult::Ok => Ok(Self {
                oid,
                kind,
                writable: false,
                value: RwLock::new(initial),
            }),
            refusal => Err(rejected(&oid, kind, refusal)),
        }
    }

    fn with_value(oid: Oid, kind: ScalarKind, value: Value) -> Self {
        Self {
            oid,
            kind,
            writable: false,
            value: RwLock::new(value),
        }
    }

    pub fn integer32(oid: Oid, value: i32) -> Self {
        Self::with_value(oid, ScalarKind::Integer32, Value::Integer(value))
    }

    pub fn unsigned32(oid: Oid, value: u32) -> Self {
        Self::with_value(oid, ScalarKind::Unsigned32, Value::Gauge32(value))
    }

    pub fn counter32(oid: Oid, value: u32) -> Self {
        Self::with_value(oid, ScalarKind::Counter32, Value::Counter32(value))
    }

    pub fn counter64(oid: Oid, value: u64) -> Self {
        Self::with_value(oid, ScalarKind::Counter64, Value::Counter64(value))
    }

    pub fn timeticks(oid: Oid, value: u32) -> Self {
        Self::with_value(oid, ScalarKind::TimeTicks, Value::TimeTicks(value))
    }

    pub fn ip_address(oid: Oid, value: Ipv4Addr) -> Self {
        Self::with_value(oid, ScalarKind::IpAddress, Value::IpAddress(value.octets()))
    }

    /// Fails if `value` is longer than [`MAX_STRING_SIZE`].
    pub fn octet_string(oid: Oid, value: impl Into<Bytes>) -> Result<Self> {
        Self::new(oid, ScalarKind::OctetString, Value::OctetString(value.into()))
    }

    /// Fails if `value` is longer than [`MAX_STRING_SIZE`] bytes.
    pub fn display_string(oid: Oid, value: &str) -> Result<Self> {
        Self::new(
            oid,
            ScalarKind::DisplayString,
            Value::OctetString(Bytes::copy_from_slice(value.as_bytes())),
        )
    }

    /// Accept Sets from the master.
    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Current value.
    pub fn value(&self) -> Value {
        self.value.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace the value. The new value must match the cell's kind and,
    /// for strings, fit in [`MAX_STRING_SIZE`].
    pub fn update(&self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        match self.kind.check(&value) {
            SetResult::Ok => {
                self.store(value);
                Ok(())
            }
            refusal => Err(rejected(&self.oid, self.kind, refusal)),
        }
    }

    /// Add `delta` to a numeric cell.
    ///
    /// Counter32, Counter64 and TimeTicks wrap; Unsigned32 saturates.
    /// Other kinds are an error.
    pub fn increment(&self, delta: u64) -> Result<()> {
        let mut guard = self.value.write().unwrap_or_else(PoisonError::into_inner);
        let next = match (&*guard, self.kind) {
            (Value::Counter32(v), _) => Value::Counter32(v.wrapping_add(delta as u32)),
            (Value::TimeTicks(v), _) => Value::TimeTicks(v.wrapping_add(delta as u32)),
            (Value::Counter64(v), _) => Value::Counter64(v.wrapping_add(delta)),
            (Value::Gauge32(v), _) => {
                Value::Gauge32(u32::try_from(u64::from(*v).saturating_add(delta)).unwrap_or(u32::MAX))
            }
            (_, kind) => {
                return Err(Error::handler(
                    self.oid.clone(),
                    format!("cannot increment a {} cell", kind),
                ));
            }
        };
        *guard = next;
        Ok(())
    }

    fn store(&self, value: Value) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

fn rejected(oid: &Oid, kind: ScalarKind, refusal: SetResult) -> Error {
    let message = match refusal {
        SetResult::WrongLength => format!("{} value longer than {} bytes", kind, MAX_STRING_SIZE),
        SetResult::WrongValue => format!("{} value is not valid UTF-8", kind),
        _ => format!("value does not match cell type {}", kind),
    };
    Error::handler(oid.clone(), message)
}

impl ScalarHandler for ScalarCell {
    fn get<'a>(&'a self, _ctx: &'a RequestContext) -> BoxFuture<'a, GetResult> {
        Box::pin(async move { GetResult::Value(self.value()) })
    }

    fn test_set<'a>(&'a self, _ctx: &'a RequestContext, value: &'a Value) -> BoxFuture<'a, SetResult> {
        Box::pin(async move {
            if !self.writable {
                return SetResult::NotWritable;
            }
            self.kind.check(value)
        })
    }

    fn commit_set<'a>(&'a self, _ctx: &'a RequestContext, value: &'a Value) -> BoxFuture<'a, SetResult> {
        Box::pin(async move {
            match self.kind.check(value) {
                SetResult::Ok if self.writable => {
                    self.store(value.clone());
                    SetResult::Ok
                }
                _ => SetResult::CommitFailed,
            }
        })
    }

    fn undo_set<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        previous: Option<&'a Value>,
    ) -> BoxFuture<'a, SetResult> {
        Box::pin(async move {
            match previous {
                Some(value) => {
                    self.store(value.clone());
                    SetResult::Ok
                }
                None => SetResult::UndoFailed,
            }
        })
    }

    fn capabilities(&self) -> Capabilities {
        if self.writable {
            Capabilities::READ_WRITE
        } else {
            Capabilities::READ_ONLY
        }
    }
}
