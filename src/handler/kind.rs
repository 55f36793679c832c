//! The tagged handler stored in a registration.

use std::sync::Arc;

use crate::oid::Oid;
use crate::value::Value;
use crate::varbind::VarBind;

use super::{
    Capabilities, GetNextResult, GetResult, MibHandler, RequestContext, ScalarHandler, SetResult,
    TableHandler,
};

/// A registered handler, tagged by kind.
///
/// Every operation takes the registration's anchor OID: the instance OID
/// for a scalar, the entry OID (`xxxEntry`, without column) for a table,
/// and the registered subtree for a free-form handler.
#[derive(Clone)]
pub enum Handler {
    Scalar(Arc<dyn ScalarHandler>),
    Table(Arc<dyn TableHandler>),
    Subtree(Arc<dyn MibHandler>),
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Handler::Scalar(_) => "Scalar",
            Handler::Table(_) => "Table",
            Handler::Subtree(_) => "Subtree",
        };
        f.debug_tuple("Handler").field(&kind).finish()
    }
}

/// Where a table cell OID lands relative to the table.
enum CellAddress {
    Cell { column: u32, row: Oid },
    /// The entry itself or a bare column, with no row index.
    Partial,
    Outside,
}

fn table_cell(table: &dyn TableHandler, entry: &Oid, oid: &Oid) -> CellAddress {
    match oid.strip_prefix(entry) {
        Some([]) => CellAddress::Partial,
        Some([column, row @ ..]) if table.columns().contains(column) => {
            if row.is_empty() {
                CellAddress::Partial
            } else {
                CellAddress::Cell {
                    column: *column,
                    row: Oid::from_slice(row),
                }
            }
        }
        _ => CellAddress::Outside,
    }
}

impl Handler {
    pub fn capabilities(&self) -> Capabilities {
        match self {
            Handler::Scalar(h) => h.capabilities(),
            Handler::Table(h) => h.capabilities(),
            Handler::Subtree(h) => h.capabilities(),
        }
    }

    /// Read `oid`, which lies inside this handler's registration.
    pub async fn get(&self, ctx: &RequestContext, anchor: &Oid, oid: &Oid) -> GetResult {
        match self {
            Handler::Scalar(h) => {
                if oid == anchor {
                    h.get(ctx).await
                } else if oid.starts_with(anchor) {
                    GetResult::NoSuchInstance
                } else {
                    GetResult::NoSuchObject
                }
            }
            Handler::Table(h) => match table_cell(h.as_ref(), anchor, oid) {
                CellAddress::Cell { column, row } => h.get_cell(ctx, column, &row).await,
                CellAddress::Partial => GetResult::NoSuchInstance,
                CellAddress::Outside => GetResult::NoSuchObject,
            },
            Handler::Subtree(h) => h.get(ctx, oid).await,
        }
    }

    /// The first value strictly after `oid` that this handler can produce.
    pub async fn get_next(&self, ctx: &RequestContext, anchor: &Oid, oid: &Oid) -> GetNextResult {
        match self {
            Handler::Scalar(h) => {
                if oid >= anchor {
                    return GetNextResult::EndOfMibView;
                }
                match h.get(ctx).await {
                    GetResult::Value(v) => GetNextResult::Value(VarBind::new(anchor.clone(), v)),
                    GetResult::Failed(msg) => GetNextResult::Failed(msg),
                    _ => GetNextResult::EndOfMibView,
                }
            }
            Handler::Table(h) => table_next(h.as_ref(), ctx, anchor, oid).await,
            Handler::Subtree(h) => h.get_next(ctx, oid).await,
        }
    }

    pub async fn test_set(
        &self,
        ctx: &RequestContext,
        anchor: &Oid,
        oid: &Oid,
        value: &Value,
    ) -> SetResult {
        match self {
            Handler::Scalar(h) => {
                if oid == anchor {
                    h.test_set(ctx, value).await
                } else {
                    SetResult::NoCreation
                }
            }
            Handler::Table(h) => match table_cell(h.as_ref(), anchor, oid) {
                CellAddress::Cell { column, row } => h.test_cell(ctx, column, &row, value).await,
                CellAddress::Partial => SetResult::NoCreation,
                CellAddress::Outside => SetResult::NotWritable,
            },
            Handler::Subtree(h) => h.test_set(ctx, oid, value).await,
        }
    }

    pub async fn commit_set(
        &self,
        ctx: &RequestContext,
        anchor: &Oid,
        oid: &Oid,
        value: &Value,
    ) -> SetResult {
        match self {
            Handler::Scalar(h) if oid == anchor => h.commit_set(ctx, value).await,
            Handler::Scalar(_) => SetResult::CommitFailed,
            Handler::Table(h) => match table_cell(h.as_ref(), anchor, oid) {
                CellAddress::Cell { column, row } => h.commit_cell(ctx, column, &row, value).await,
                _ => SetResult::CommitFailed,
            },
            Handler::Subtree(h) => h.commit_set(ctx, oid, value).await,
        }
    }

    pub async fn undo_set(
        &self,
        ctx: &RequestContext,
        anchor: &Oid,
        oid: &Oid,
        previous: Option<&Value>,
    ) -> SetResult {
        match self {
            Handler::Scalar(h) if oid == anchor => h.undo_set(ctx, previous).await,
            Handler::Scalar(_) => SetResult::UndoFailed,
            Handler::Table(h) => match table_cell(h.as_ref(), anchor, oid) {
                CellAddress::Cell { column, row } => h.undo_cell(ctx, column, &row, previous).await,
                _ => SetResult::UndoFailed,
            },
            Handler::Subtree(h) => h.undo_set(ctx, oid, previous).await,
        }
    }

    pub async fn cleanup_set(&self, ctx: &RequestContext, anchor: &Oid, oid: &Oid) {
        match self {
            Handler::Scalar(h) if oid == anchor => h.cleanup_set(ctx).await,
            Handler::Scalar(_) => {}
            Handler::Table(h) => {
                if let CellAddress::Cell { column, row } = table_cell(h.as_ref(), anchor, oid) {
                    h.cleanup_cell(ctx, column, &row).await;
                }
            }
            Handler::Subtree(h) => h.cleanup_set(ctx, oid).await,
        }
    }
}

/// Column-major walk of a table from just after `oid`.
async fn table_next(
    table: &dyn TableHandler,
    ctx: &RequestContext,
    entry: &Oid,
    oid: &Oid,
) -> GetNextResult {
    let columns = table.columns();
    let (first, last) = (*columns.start(), *columns.end());
    if first > last {
        return GetNextResult::EndOfMibView;
    }

    let (mut column, mut after) = match oid.strip_prefix(entry) {
        Some([]) => (first, None),
        Some([col, ..]) if *col < first => (first, None),
        Some([col, ..]) if *col > last => return GetNextResult::EndOfMibView,
        Some([col]) => (*col, None),
        Some([col, row @ ..]) => (*col, Some(Oid::from_slice(row))),
        None if oid < entry => (first, None),
        None => return GetNextResult::EndOfMibView,
    };

    loop {
        let mut cursor = after.take();
        loop {
            let Some(row) = table.next_row(ctx, cursor.as_ref()).await else {
                break;
            };
            if cursor.as_ref().is_some_and(|prev| &row <= prev) {
                tracing::warn!(
                    target: "async_agentx::handler",
                    { agentx.entry = %entry, agentx.row = %row },
                    "table returned rows out of order, treating as exhausted"
                );
                break;
            }
            match table.get_cell(ctx, column, &row).await {
                GetResult::Value(value) => {
                    let name = entry.child(column).extend(row.arcs());
                    return GetNextResult::Value(VarBind::new(name, value));
                }
                GetResult::Failed(msg) => return GetNextResult::Failed(msg),
                GetResult::NoSuchObject | GetResult::NoSuchInstance => {}
            }
            cursor = Some(row);
        }
        if column >= last {
            return GetNextResult::EndOfMibView;
        }
        column += 1;
    }
}
