//! Requests from the master routed through a live session.

mod common;

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_agentx::error::ResponseError;
use async_agentx::handler::{
    BoxFuture, Capabilities, GetResult, IndexedRows, RequestContext, ScalarCell, SetResult,
    TableHandler,
};
use async_agentx::pdu::{CloseReason, GetBulkPdu, PduBody};
use async_agentx::{Oid, SearchRange, Session, Value, VarBind, oid};
use common::*;

/// Interface-style table: column 1 is the index, column 2 a writable name.
/// Committing the name "fail" fails.
struct Names {
    rows: Mutex<IndexedRows<String>>,
    cleanups: AtomicUsize,
}

impl Names {
    fn new(names: &[&str]) -> Arc<Self> {
        let mut rows = IndexedRows::new();
        for (i, name) in (1u32..).zip(names) {
            rows.insert(oid!(i), name.to_string());
        }
        Arc::new(Self {
            rows: Mutex::new(rows),
            cleanups: AtomicUsize::new(0),
        })
    }

    fn name(&self, index: u32) -> Option<String> {
        self.rows.lock().unwrap().get(&oid!(index)).cloned()
    }

    fn set(&self, row: &Oid, value: &Value) -> SetResult {
        let Value::OctetString(data) = value else {
            return SetResult::WrongType;
        };
        if &data[..] == b"fail" {
            return SetResult::CommitFailed;
        }
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(row) {
            Some(name) => {
                *name = String::from_utf8_lossy(data).into_owned();
                SetResult::Ok
            }
            None => SetResult::CommitFailed,
        }
    }
}

impl TableHandler for Names {
    fn columns(&self) -> RangeInclusive<u32> {
        1..=2
    }

    fn next_row<'a>(&'a self, _ctx: &'a RequestContext, after: Option<&'a Oid>) -> BoxFuture<'a, Option<Oid>> {
        let next = self.rows.lock().unwrap().next_after(after).map(|(i, _)| i.clone());
        Box::pin(async move { next })
    }

    fn get_cell<'a>(&'a self, _ctx: &'a RequestContext, column: u32, row: &'a Oid) -> BoxFuture<'a, GetResult> {
        let rows = self.rows.lock().unwrap();
        let result = match (column, rows.get(row), row.arcs()) {
            (1, Some(_), &[i]) => GetResult::Value(Value::Integer(i as i32)),
            (2, Some(name), _) => GetResult::Value(Value::from(name.as_str())),
            _ => GetResult::NoSuchInstance,
        };
        Box::pin(async move { result })
    }

    fn test_cell<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        column: u32,
        row: &'a Oid,
        value: &'a Value,
    ) -> BoxFuture<'a, SetResult> {
        let exists = self.rows.lock().unwrap().get(row).is_some();
        let result = match (column, exists, value) {
            (2, true, Value::OctetString(_)) => SetResult::Ok,
            (2, true, _) => SetResult::WrongType,
            (2, false, _) => SetResult::NoCreation,
            _ => SetResult::NotWritable,
        };
        Box::pin(async move { result })
    }

    fn commit_cell<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _column: u32,
        row: &'a Oid,
        value: &'a Value,
    ) -> BoxFuture<'a, SetResult> {
        let result = self.set(row, value);
        Box::pin(async move { result })
    }

    fn undo_cell<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _column: u32,
        row: &'a Oid,
        previous: Option<&'a Value>,
    ) -> BoxFuture<'a, SetResult> {
        let result = previous.map_or(SetResult::UndoFailed, |v| self.set(row, v));
        Box::pin(async move { result })
    }

    fn cleanup_cell<'a>(&'a self, _ctx: &'a RequestContext, _column: u32, _row: &'a Oid) -> BoxFuture<'a, ()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        Box::pin(async {})
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::READ_WRITE
    }
}

async fn serve_names(names: &[&str]) -> (Session, FakeMaster, Arc<Names>) {
    let (session, mut master) = FakeMaster::connect(Session::builder()).await;
    let table = Names::new(names);
    let (id, _) = tokio::join!(
        session.register_table(port_entry(), Arc::clone(&table) as Arc<dyn TableHandler>),
        master.accept_register()
    );
    id.unwrap();
    (session, master, table)
}

fn rename(index: u32, name: &str) -> VarBind {
    VarBind::new(port_cell(2, index), Value::from(name))
}

async fn get_name(master: &mut FakeMaster, index: u32) -> Value {
    let resp = master
        .request(1, PduBody::Get(vec![SearchRange::exact(port_cell(2, index))]))
        .await;
    resp.varbinds[0].value.clone()
}

#[tokio::test]
async fn test_table_registers_as_column_range() {
    let (mut master, stream) = FakeMaster::new();
    let (session, _) = tokio::join!(Session::builder().open_stream(stream), master.accept_open());
    let session = session.unwrap();

    let table = Names::new(&["eth0"]);
    let (id, register) = tokio::join!(
        session.register_table(port_entry(), table as Arc<dyn TableHandler>),
        master.accept_register()
    );
    id.unwrap();
    match register.body {
        PduBody::Register(reg) => {
            assert_eq!(reg.subtree, port_entry().child(1));
            assert_eq!(reg.range_subid as usize, port_entry().len() + 1);
            assert_eq!(reg.upper_bound, Some(2));
        }
        other => panic!("expected Register, got {:?}", other),
    }
}

#[tokio::test]
async fn test_get_next_walks_columns_then_stops() {
    let (_session, mut master, _table) = serve_names(&["eth0", "eth1"]).await;

    let mut walked = Vec::new();
    let mut start = port_entry();
    loop {
        let resp = master
            .request(2, PduBody::GetNext(vec![SearchRange::new(start.clone(), Oid::empty(), false)]))
            .await;
        let vb = resp.varbinds.into_iter().next().unwrap();
        if vb.value == Value::EndOfMibView {
            assert_eq!(vb.oid, start);
            break;
        }
        start = vb.oid.clone();
        walked.push(vb);
    }

    assert_eq!(
        walked,
        vec![
            VarBind::new(port_cell(1, 1), Value::Integer(1)),
            VarBind::new(port_cell(1, 2), Value::Integer(2)),
            VarBind::new(port_cell(2, 1), Value::from("eth0")),
            VarBind::new(port_cell(2, 2), Value::from("eth1")),
        ]
    );
}

#[tokio::test]
async fn test_get_bulk_matches_get_next() {
    let (_session, mut master, _table) = serve_names(&["eth0", "eth1"]).await;

    let resp = master
        .request(
            3,
            PduBody::GetBulk(GetBulkPdu {
                non_repeaters: 0,
                max_repetitions: 10,
                ranges: vec![SearchRange::new(port_entry(), Oid::empty(), false)],
            }),
        )
        .await;
    assert_eq!(resp.error, ResponseError::NoError);
    let oids: Vec<Oid> = resp.varbinds.iter().map(|vb| vb.oid.clone()).collect();
    assert_eq!(
        oids,
        vec![port_cell(1, 1), port_cell(1, 2), port_cell(2, 1), port_cell(2, 2), port_cell(2, 2)]
    );
    assert_eq!(resp.varbinds[4].value, Value::EndOfMibView);
}

#[tokio::test]
async fn test_test_then_cleanup_changes_nothing() {
    let (_session, mut master, table) = serve_names(&["eth0"]).await;

    let resp = master.request(40, PduBody::TestSet(vec![rename(1, "uplink")])).await;
    assert_eq!(resp.error, ResponseError::NoError);

    // No response to CleanupSet: the next Response must belong to the Get
    master.send(40, PduBody::CleanupSet).await;
    assert_eq!(get_name(&mut master, 1).await, Value::from("eth0"));
    assert_eq!(table.cleanups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_commit_then_cleanup_applies() {
    let (_session, mut master, table) = serve_names(&["eth0"]).await;

    master.request(41, PduBody::TestSet(vec![rename(1, "uplink")])).await;
    let resp = master.request(41, PduBody::CommitSet).await;
    assert_eq!(resp.error, ResponseError::NoError);
    master.send(41, PduBody::CleanupSet).await;

    assert_eq!(get_name(&mut master, 1).await, Value::from("uplink"));
    assert_eq!(table.name(1).as_deref(), Some("uplink"));
}

#[tokio::test]
async fn test_undo_restores_row() {
    let (_session, mut master, table) = serve_names(&["eth0"]).await;

    master.request(42, PduBody::TestSet(vec![rename(1, "uplink")])).await;
    master.request(42, PduBody::CommitSet).await;
    assert_eq!(table.name(1).as_deref(), Some("uplink"));

    let resp = master.request(42, PduBody::UndoSet).await;
    assert_eq!(resp.error, ResponseError::NoError);
    assert_eq!(table.name(1).as_deref(), Some("eth0"));
    assert_eq!(table.cleanups.load(Ordering::SeqCst), 1);

    // The transaction is gone
    let resp = master.request(42, PduBody::CommitSet).await;
    assert_eq!(resp.error, ResponseError::ProcessingError);
}

#[tokio::test]
async fn test_partial_commit_then_undo() {
    let (_session, mut master, table) = serve_names(&["eth0", "eth1"]).await;

    let resp = master
        .request(43, PduBody::TestSet(vec![rename(1, "uplink"), rename(2, "fail")]))
        .await;
    assert_eq!(resp.error, ResponseError::NoError);

    let resp = master.request(43, PduBody::CommitSet).await;
    assert_eq!(resp.error, ResponseError::CommitFailed);
    assert_eq!(resp.index, 2);
    assert_eq!(table.name(1).as_deref(), Some("uplink"));
    assert_eq!(table.name(2).as_deref(), Some("eth1"));

    let resp = master.request(43, PduBody::UndoSet).await;
    assert_eq!(resp.error, ResponseError::NoError);
    assert_eq!(table.name(1).as_deref(), Some("eth0"));
    assert_eq!(table.name(2).as_deref(), Some("eth1"));
}

#[tokio::test]
async fn test_refused_test_set_reports_index() {
    let (_session, mut master, table) = serve_names(&["eth0"]).await;

    let resp = master
        .request(
            44,
            PduBody::TestSet(vec![
                rename(1, "uplink"),
                VarBind::new(port_cell(2, 1), Value::Integer(3)),
            ]),
        )
        .await;
    assert_eq!(resp.error, ResponseError::WrongType);
    assert_eq!(resp.index, 2);

    let resp = master.request(44, PduBody::CommitSet).await;
    assert_eq!(resp.error, ResponseError::ProcessingError);
    master.send(44, PduBody::CleanupSet).await;
    assert_eq!(get_name(&mut master, 1).await, Value::from("eth0"));
    assert_eq!(table.cleanups.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_set_read_only_scalar_is_not_writable() {
    let (session, mut master, _table) = serve_names(&["eth0"]).await;
    let cell = Arc::new(ScalarCell::integer32(answer_oid(), 42));
    let (id, _) = tokio::join!(session.register_cell(cell), master.accept_register());
    id.unwrap();

    let resp = master
        .request(45, PduBody::TestSet(vec![VarBind::new(answer_oid(), Value::Integer(1))]))
        .await;
    assert_eq!(resp.error, ResponseError::NotWritable);
    assert_eq!(resp.index, 1);
}

#[tokio::test]
async fn test_session_end_undoes_open_commit() {
    let (session, mut master, table) = serve_names(&["eth0"]).await;

    master.request(46, PduBody::TestSet(vec![rename(1, "uplink")])).await;
    master.request(46, PduBody::CommitSet).await;
    assert_eq!(table.name(1).as_deref(), Some("uplink"));

    master.close(CloseReason::Shutdown).await;
    assert!(session.wait_closed().await.is_err());
    assert_eq!(table.name(1).as_deref(), Some("eth0"));
    assert_eq!(table.cleanups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unexpected_pdu_is_processing_error() {
    let (_session, mut master, _table) = serve_names(&["eth0"]).await;

    let resp = master
        .request(47, PduBody::Notify(vec![VarBind::new(answer_oid(), Value::Integer(1))]))
        .await;
    assert_eq!(resp.error, ResponseError::ProcessingError);
}
