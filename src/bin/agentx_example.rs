//! agentx-example: a demonstration AgentX subagent.
//!
//! Serves a handful of scalars and a small table under
//! `1.3.6.1.4.1.99999`, bumps its counters on a timer, and reconnects when
//! the master goes away.
//!
//! Signals: SIGHUP dumps the registered values to stdout, SIGINT and
//! SIGTERM close the session and exit.

use async_agentx::cli::args::{AgentArgs, OutputArgs};
use async_agentx::cli::output::{ValueDump, write_error};
use async_agentx::handler::{
    BoxFuture, Capabilities, GetResult, IndexedRows, RequestContext, ScalarCell, SetResult,
    TableHandler,
};
use async_agentx::pdu::CloseReason;
use async_agentx::{Error, Oid, Session, Value, oid};
use clap::Parser;
use std::ops::RangeInclusive;
use std::process::ExitCode;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Run a demonstration AgentX subagent.
#[derive(Debug, Parser)]
#[command(name = "agentx-example", version, about)]
struct Args {
    #[command(flatten)]
    agent: AgentArgs,

    #[command(flatten)]
    output: OutputArgs,

    /// Seconds between value updates.
    #[arg(short = 'i', long = "interval", default_value = "1",
          value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,
}

const PORT_NAME_MAX: usize = 255;

#[derive(Debug, Clone)]
struct Port {
    name: String,
    octets: u32,
}

/// `examplePortTable`: index, writable name, octet counter.
struct PortTable {
    rows: RwLock<IndexedRows<Port>>,
}

impl PortTable {
    fn new(names: &[&str]) -> Self {
        let mut rows = IndexedRows::new();
        for (i, name) in (1u32..).zip(names) {
            rows.insert(
                oid!(i),
                Port {
                    name: name.to_string(),
                    octets: 0,
                },
            );
        }
        Self {
            rows: RwLock::new(rows),
        }
    }

    fn bump(&self, delta: u32) {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let indexes: Vec<Oid> = rows.iter().map(|(i, _)| i.clone()).collect();
        for (n, index) in (1u32..).zip(indexes) {
            if let Some(port) = rows.get_mut(&index) {
                port.octets = port.octets.wrapping_add(delta.wrapping_mul(n));
            }
        }
    }

    fn cell(&self, column: u32, row: &Oid) -> Option<Value> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let port = rows.get(row)?;
        match (column, row.arcs()) {
            (1, &[index]) => Some(Value::Integer(index as i32)),
            (2, _) => Some(Value::from(port.name.as_str())),
            (3, _) => Some(Value::Counter32(port.octets)),
            _ => None,
        }
    }

    fn check_name(&self, column: u32, row: &Oid, value: &Value) -> SetResult {
        if column != 2 {
            return SetResult::NotWritable;
        }
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        if rows.get(row).is_none() {
            return SetResult::NoCreation;
        }
        match value {
            Value::OctetString(data) if data.len() > PORT_NAME_MAX => SetResult::WrongLength,
            Value::OctetString(data) if std::str::from_utf8(data).is_err() => SetResult::WrongValue,
            Value::OctetString(_) => SetResult::Ok,
            _ => SetResult::WrongType,
        }
    }

    fn store_name(&self, row: &Oid, value: &Value) -> SetResult {
        let Value::OctetString(data) = value else {
            return SetResult::CommitFailed;
        };
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        match rows.get_mut(row) {
            Some(port) => {
                port.name = String::from_utf8_lossy(data).into_owned();
                SetResult::Ok
            }
            None => SetResult::CommitFailed,
        }
    }
}

impl TableHandler for PortTable {
    fn columns(&self) -> RangeInclusive<u32> {
        1..=3
    }

    fn next_row<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        after: Option<&'a Oid>,
    ) -> BoxFuture<'a, Option<Oid>> {
        let next = self
            .rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .next_after(after)
            .map(|(index, _)| index.clone());
        Box::pin(async move { next })
    }

    fn get_cell<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        column: u32,
        row: &'a Oid,
    ) -> BoxFuture<'a, GetResult> {
        let result = self
            .cell(column, row)
            .map_or(GetResult::NoSuchInstance, GetResult::Value);
        Box::pin(async move { result })
    }

    fn test_cell<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        column: u32,
        row: &'a Oid,
        value: &'a Value,
    ) -> BoxFuture<'a, SetResult> {
        let result = self.check_name(column, row, value);
        Box::pin(async move { result })
    }

    fn commit_cell<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _column: u32,
        row: &'a Oid,
        value: &'a Value,
    ) -> BoxFuture<'a, SetResult> {
        let result = self.store_name(row, value);
        Box::pin(async move { result })
    }

    fn undo_cell<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _column: u32,
        row: &'a Oid,
        previous: Option<&'a Value>,
    ) -> BoxFuture<'a, SetResult> {
        let result = match previous {
            Some(value) => match self.store_name(row, value) {
                SetResult::Ok => SetResult::Ok,
                _ => SetResult::UndoFailed,
            },
            None => SetResult::Ok,
        };
        Box::pin(async move { result })
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::READ_WRITE
    }
}

/// Everything the example serves. Outlives any one session so values
/// survive reconnects.
struct ExampleMib {
    integer: Arc<ScalarCell>,
    name: Arc<ScalarCell>,
    counter: Arc<ScalarCell>,
    uptime: Arc<ScalarCell>,
    address: Arc<ScalarCell>,
    octets: Arc<ScalarCell>,
    ports: Arc<PortTable>,
}

impl ExampleMib {
    const BASE: [u32; 7] = [1, 3, 6, 1, 4, 1, 99999];

    fn new() -> async_agentx::Result<Self> {
        let base = Oid::from_slice(&Self::BASE);
        let scalar = |arc: u32| base.child(arc).child(0);
        Ok(Self {
            integer: Arc::new(ScalarCell::integer32(scalar(1), 42).writable()),
            name: Arc::new(ScalarCell::display_string(scalar(2), "example")?.writable()),
            counter: Arc::new(ScalarCell::counter32(scalar(3), 0)),
            uptime: Arc::new(ScalarCell::timeticks(scalar(4), 0)),
            address: Arc::new(ScalarCell::ip_address(
                scalar(5),
                std::net::Ipv4Addr::LOCALHOST,
            )),
            octets: Arc::new(ScalarCell::counter64(scalar(6), 0)),
            ports: Arc::new(PortTable::new(&["eth0", "eth1", "wlan0"])),
        })
    }

    fn cells(&self) -> [&Arc<ScalarCell>; 6] {
        [
            &self.integer,
            &self.name,
            &self.counter,
            &self.uptime,
            &self.address,
            &self.octets,
        ]
    }

    async fn register(&self, session: &Session) -> async_agentx::Result<()> {
        for cell in self.cells() {
            session.register_cell(Arc::clone(cell)).await?;
        }
        let entry = Oid::from_slice(&Self::BASE).child(7).child(1);
        session
            .register_table(entry, Arc::clone(&self.ports) as Arc<dyn TableHandler>)
            .await?;
        Ok(())
    }

    fn tick(&self) -> async_agentx::Result<()> {
        self.counter.increment(2)?;
        self.uptime.increment(1)?;
        self.octets.increment(1500)?;
        self.ports.bump(64);
        Ok(())
    }
}

struct Signals {
    hangup: Signal,
    interrupt: Signal,
    terminate: Signal,
}

impl Signals {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }
}

enum Outcome {
    Shutdown,
    Lost(Error),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    args.output.init_tracing();

    let mut signals = match Signals::install() {
        Ok(signals) => signals,
        Err(e) => {
            eprintln!("Error: installing signal handlers: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mib = match ExampleMib::new() {
        Ok(mib) => mib,
        Err(e) => {
            write_error(&e);
            return ExitCode::FAILURE;
        }
    };

    loop {
        let session = match args.agent.session_builder().connect().await {
            Ok(session) => session,
            Err(e) => {
                write_error(&e);
                return ExitCode::FAILURE;
            }
        };

        if let Err(e) = mib.register(&session).await {
            write_error(&e);
            let _ = session.close(CloseReason::Other).await;
            return ExitCode::FAILURE;
        }

        tracing::info!(
            target: "agentx_example",
            { agentx.session_id = session.session_id(), agentx.registrations = session.registration_count() },
            "subagent ready"
        );

        match serve(&session, &mib, &mut signals, &args).await {
            Ok(Outcome::Shutdown) => return ExitCode::SUCCESS,
            Ok(Outcome::Lost(e)) => {
                tracing::warn!(target: "agentx_example", { error = %e }, "session lost, reconnecting");
            }
            Err(e) => {
                write_error(&e);
                return ExitCode::FAILURE;
            }
        }
    }
}

async fn serve(
    session: &Session,
    mib: &ExampleMib,
    signals: &mut Signals,
    args: &Args,
) -> async_agentx::Result<Outcome> {
    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = mib.tick() {
                    tracing::warn!(target: "agentx_example", { error = %e }, "update failed");
                }
            }
            _ = signals.hangup.recv() => {
                let dump = ValueDump::new(session.session_id(), &session.registered_values());
                if let Err(e) = dump.write(args.output.format) {
                    eprintln!("Error writing output: {}", e);
                }
            }
            _ = signals.interrupt.recv() => {
                session.close(CloseReason::Shutdown).await?;
                return Ok(Outcome::Shutdown);
            }
            _ = signals.terminate.recv() => {
                session.close(CloseReason::Shutdown).await?;
                return Ok(Outcome::Shutdown);
            }
            result = session.wait_closed() => {
                return match result {
                    Ok(()) => Ok(Outcome::Shutdown),
                    Err(e @ Error::SessionLost { .. }) => Ok(Outcome::Lost(e)),
                    Err(e) => Err(e),
                };
            }
        }
    }
}
