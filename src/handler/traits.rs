//! Handler traits.

use std::future::Future;
use std::ops::RangeInclusive;
use std::pin::Pin;

use crate::oid::Oid;
use crate::value::Value;

use super::{GetNextResult, GetResult, RequestContext, SetResult};

/// Boxed future returned by handler methods.
///
/// Handlers live behind `Arc<dyn ...>` in the registry, so their methods
/// cannot be `async fn`.
///
/// ```rust
/// use async_agentx::handler::{BoxFuture, GetResult};
///
/// fn answer<'a>(value: &'a i32) -> BoxFuture<'a, GetResult> {
///     Box::pin(async move { GetResult::Value(async_agentx::Value::Integer(*value)) })
/// }
/// ```
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Operations a handler accepts.
///
/// The dispatcher consults these flags before calling into the handler:
/// a Set against a handler without `set` fails TestSet with `notWritable`
/// and never reaches the handler's test method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub get: bool,
    pub get_next: bool,
    pub set: bool,
}

impl Capabilities {
    pub const READ_ONLY: Self = Self {
        get: true,
        get_next: true,
        set: false,
    };

    pub const READ_WRITE: Self = Self {
        get: true,
        get_next: true,
        set: true,
    };

    /// Every Set phase is accepted but the object is hidden from walks.
    pub const WRITE_ONLY: Self = Self {
        get: false,
        get_next: false,
        set: true,
    };
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::READ_ONLY
    }
}

/// A single object instance.
///
/// Registered with [`Session::register_scalar`](crate::session::Session::register_scalar)
/// at the instance OID (for example `sysDescr.0`); requests for any deeper
/// OID under it answer `noSuchInstance` without calling the handler.
///
/// ```rust
/// use async_agentx::handler::{BoxFuture, GetResult, RequestContext, ScalarHandler};
/// use async_agentx::Value;
///
/// struct Answer;
///
/// impl ScalarHandler for Answer {
///     fn get<'a>(&'a self, _ctx: &'a RequestContext) -> BoxFuture<'a, GetResult> {
///         Box::pin(async { GetResult::Value(Value::Integer(42)) })
///     }
/// }
/// ```
pub trait ScalarHandler: Send + Sync {
    fn get<'a>(&'a self, ctx: &'a RequestContext) -> BoxFuture<'a, GetResult>;

    /// Validate `value` without applying it.
    fn test_set<'a>(&'a self, _ctx: &'a RequestContext, _value: &'a Value) -> BoxFuture<'a, SetResult> {
        Box::pin(async { SetResult::NotWritable })
    }

    /// Apply a value that passed `test_set` in the same transaction.
    fn commit_set<'a>(&'a self, _ctx: &'a RequestContext, _value: &'a Value) -> BoxFuture<'a, SetResult> {
        Box::pin(async { SetResult::NotWritable })
    }

    /// Put back the value read before the commit. `previous` is `None`
    /// when the object had no value.
    fn undo_set<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _previous: Option<&'a Value>,
    ) -> BoxFuture<'a, SetResult> {
        Box::pin(async { SetResult::Ok })
    }

    /// Release anything reserved by `test_set`. Called once per tested
    /// VarBind when the transaction ends, whatever its outcome.
    fn cleanup_set<'a>(&'a self, _ctx: &'a RequestContext) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::READ_ONLY
    }
}

/// A conceptual table whose rows are enumerated lazily.
///
/// Cells are addressed as `entry.column.index`, where `index` is the row's
/// index arcs. Registered with
/// [`Session::register_table`](crate::session::Session::register_table),
/// which covers every column in [`columns`](TableHandler::columns) with a
/// single range registration.
///
/// Walks never materialise the table: the dispatcher asks for the row after
/// the last one it saw and reads one cell at a time. `next_row` must return
/// rows in strictly ascending index order; a handler that repeats or goes
/// backwards is treated as exhausted.
///
/// ```rust
/// use std::ops::RangeInclusive;
/// use async_agentx::handler::{BoxFuture, GetResult, RequestContext, TableHandler};
/// use async_agentx::{Oid, Value, oid};
///
/// /// Two rows indexed 1 and 2, one Integer column.
/// struct Small;
///
/// impl TableHandler for Small {
///     fn columns(&self) -> RangeInclusive<u32> {
///         2..=2
///     }
///
///     fn next_row<'a>(&'a self, _ctx: &'a RequestContext, after: Option<&'a Oid>) -> BoxFuture<'a, Option<Oid>> {
///         Box::pin(async move {
///             [oid!(1), oid!(2)].into_iter().find(|row| after.is_none_or(|a| row > a))
///         })
///     }
///
///     fn get_cell<'a>(&'a self, _ctx: &'a RequestContext, _column: u32, row: &'a Oid) -> BoxFuture<'a, GetResult> {
///         Box::pin(async move {
///             match row.arcs() {
///                 [n @ 1..=2] => GetResult::Value(Value::Integer(*n as i32 * 10)),
///                 _ => GetResult::NoSuchInstance,
///             }
///         })
///     }
/// }
/// ```
pub trait TableHandler: Send + Sync {
    /// Column numbers served, in ascending order.
    fn columns(&self) -> RangeInclusive<u32>;

    /// The smallest row index strictly greater than `after`, or the first
    /// row when `after` is `None`.
    ///
    /// `after` may be a partial index taken from the request OID.
    fn next_row<'a>(&'a self, ctx: &'a RequestContext, after: Option<&'a Oid>)
    -> BoxFuture<'a, Option<Oid>>;

    /// Read one cell. Sparse tables answer `NoSuchInstance` for absent
    /// cells; walks skip them.
    fn get_cell<'a>(&'a self, ctx: &'a RequestContext, column: u32, row: &'a Oid)
    -> BoxFuture<'a, GetResult>;

    fn test_cell<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _column: u32,
        _row: &'a Oid,
        _value: &'a Value,
    ) -> BoxFuture<'a, SetResult> {
        Box::pin(async { SetResult::NotWritable })
    }

    fn commit_cell<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _column: u32,
        _row: &'a Oid,
        _value: &'a Value,
    ) -> BoxFuture<'a, SetResult> {
        Box::pin(async { SetResult::NotWritable })
    }

    /// Restore the cell's value from before the commit. `previous` is
    /// `None` when the cell did not exist, which for row-creating tables
    /// means the row should go away again.
    fn undo_cell<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _column: u32,
        _row: &'a Oid,
        _previous: Option<&'a Value>,
    ) -> BoxFuture<'a, SetResult> {
        Box::pin(async { SetResult::Ok })
    }

    fn cleanup_cell<'a>(&'a self, _ctx: &'a RequestContext, _column: u32, _row: &'a Oid) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::READ_ONLY
    }
}

/// Free-form handler for an arbitrary subtree.
///
/// The most general handler kind: it sees full OIDs and implements its own
/// successor logic. Registered with
/// [`Session::register_subtree`](crate::session::Session::register_subtree).
///
/// # GetNext
///
/// [`get_next`](MibHandler::get_next) returns the first OID in this
/// handler's data strictly greater than the one given. OIDs compare
/// arc-by-arc as unsigned integers, so `1.3.6.1.2` < `1.3.6.1.2.1` <
/// `1.3.6.1.3`. The dispatcher clips results to the request's range and to
/// the parts of the subtree this registration actually owns.
///
/// # Set
///
/// The four phases arrive as separate PDUs from the master:
///
/// 1. `test_set` for every VarBind. Nothing may change yet.
/// 2. `commit_set` for every VarBind, in order, if every test passed.
/// 3. `undo_set` in reverse order if the master rolls back, receiving the
///    value read just before the commit.
/// 4. `cleanup_set` for every VarBind once the transaction is over.
///
/// Handlers are read-only by default; override
/// [`capabilities`](MibHandler::capabilities) along with the set methods.
///
/// ```rust
/// use async_agentx::handler::{BoxFuture, GetNextResult, GetResult, MibHandler, RequestContext};
/// use async_agentx::{Oid, Value, VarBind, oid};
///
/// struct Uptime;
///
/// impl MibHandler for Uptime {
///     fn get<'a>(&'a self, _ctx: &'a RequestContext, oid: &'a Oid) -> BoxFuture<'a, GetResult> {
///         Box::pin(async move {
///             if oid == &oid!(1, 3, 6, 1, 4, 1, 99999, 5, 0) {
///                 GetResult::Value(Value::TimeTicks(100))
///             } else {
///                 GetResult::NoSuchObject
///             }
///         })
///     }
///
///     fn get_next<'a>(&'a self, _ctx: &'a RequestContext, oid: &'a Oid) -> BoxFuture<'a, GetNextResult> {
///         Box::pin(async move {
///             let only = oid!(1, 3, 6, 1, 4, 1, 99999, 5, 0);
///             if oid < &only {
///                 GetNextResult::Value(VarBind::new(only, Value::TimeTicks(100)))
///             } else {
///                 GetNextResult::EndOfMibView
///             }
///         })
///     }
/// }
/// ```
pub trait MibHandler: Send + Sync {
    fn get<'a>(&'a self, ctx: &'a RequestContext, oid: &'a Oid) -> BoxFuture<'a, GetResult>;

    fn get_next<'a>(&'a self, ctx: &'a RequestContext, oid: &'a Oid) -> BoxFuture<'a, GetNextResult>;

    fn test_set<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _oid: &'a Oid,
        _value: &'a Value,
    ) -> BoxFuture<'a, SetResult> {
        Box::pin(async { SetResult::NotWritable })
    }

    fn commit_set<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _oid: &'a Oid,
        _value: &'a Value,
    ) -> BoxFuture<'a, SetResult> {
        Box::pin(async { SetResult::NotWritable })
    }

    fn undo_set<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _oid: &'a Oid,
        _previous: Option<&'a Value>,
    ) -> BoxFuture<'a, SetResult> {
        Box::pin(async { SetResult::Ok })
    }

    fn cleanup_set<'a>(&'a self, _ctx: &'a RequestContext, _oid: &'a Oid) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::READ_ONLY
    }
}
