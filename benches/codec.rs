//! PDU codec and dispatch benchmarks.
//!
//! Covers the hot path of a subagent: decoding the master's request,
//! resolving it against the registry and encoding the Response.

use std::hint::black_box;
use std::sync::{Arc, RwLock};

use async_agentx::agent::Dispatcher;
use async_agentx::codec::{Flags, Header};
use async_agentx::handler::ScalarCell;
use async_agentx::pdu::{Pdu, PduBody, ResponsePdu};
use async_agentx::registry::{MibRegistry, Registration};
use async_agentx::{Oid, SearchRange, Value, VarBind};
use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

fn base() -> Oid {
    Oid::from_slice(&[1, 3, 6, 1, 4, 1, 99999])
}

fn request(body: PduBody, flags: Flags) -> Pdu {
    let mut pdu = Pdu::new(body);
    pdu.header = Header {
        flags,
        session_id: 7,
        transaction_id: 42,
        packet_id: 42,
        ..pdu.header
    };
    pdu
}

fn varbinds(count: usize) -> Vec<VarBind> {
    (0..count as u32)
        .map(|i| match i % 4 {
            0 => VarBind::new(base().child(i).child(0), Value::Integer(i as i32)),
            1 => VarBind::new(base().child(i).child(0), Value::Counter64(u64::from(i) << 32)),
            2 => VarBind::new(
                base().child(i).child(0),
                Value::OctetString(Bytes::from_static(b"GigabitEthernet0/1")),
            ),
            _ => VarBind::new(base().child(i).child(0), Value::TimeTicks(i * 100)),
        })
        .collect()
}

/// Encode a Response as a subagent does for each request.
fn bench_encode_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_response");

    for count in [1, 10, 50] {
        for (order, flags) in [("network", Flags::NETWORK_BYTE_ORDER), ("little", Flags::empty())] {
            let pdu = request(PduBody::Response(ResponsePdu::ok(varbinds(count))), flags);
            group.throughput(Throughput::Elements(count as u64));
            group.bench_with_input(
                BenchmarkId::new(order, count),
                &pdu,
                |b, pdu| b.iter(|| black_box(pdu.encode().unwrap())),
            );
        }
    }

    group.finish();
}

/// Decode the requests a master sends.
fn bench_decode_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_request");

    for count in [1, 10, 50] {
        let ranges: Vec<SearchRange> = varbinds(count)
            .into_iter()
            .map(|vb| SearchRange::new(vb.oid, Oid::empty(), false))
            .collect();
        let get_next = request(PduBody::GetNext(ranges), Flags::NETWORK_BYTE_ORDER)
            .encode()
            .unwrap();
        let test_set = request(PduBody::TestSet(varbinds(count)), Flags::NETWORK_BYTE_ORDER)
            .encode()
            .unwrap();

        group.throughput(Throughput::Bytes(get_next.len() as u64));
        group.bench_with_input(BenchmarkId::new("get_next", count), &get_next, |b, frame| {
            b.iter(|| black_box(Pdu::decode(frame.clone()).unwrap()))
        });
        group.throughput(Throughput::Bytes(test_set.len() as u64));
        group.bench_with_input(BenchmarkId::new("test_set", count), &test_set, |b, frame| {
            b.iter(|| black_box(Pdu::decode(frame.clone()).unwrap()))
        });
    }

    group.finish();
}

fn registry(scalars: u32) -> Arc<RwLock<MibRegistry>> {
    let mut registry = MibRegistry::new();
    for i in 0..scalars {
        let cell = Arc::new(ScalarCell::integer32(base().child(i).child(0), i as i32));
        registry
            .insert(Registration::scalar(cell.oid().clone(), cell))
            .unwrap();
    }
    Arc::new(RwLock::new(registry))
}

/// Resolve and answer GetNext against registries of growing size.
fn bench_dispatch_get_next(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let mut group = c.benchmark_group("dispatch_get_next");

    for scalars in [10, 100, 1000] {
        let registry = registry(scalars);
        let start = base().child(scalars / 2);
        let pdu = request(
            PduBody::GetNext(vec![SearchRange::new(start, Oid::empty(), false)]),
            Flags::NETWORK_BYTE_ORDER,
        );

        group.bench_with_input(BenchmarkId::from_parameter(scalars), &pdu, |b, pdu| {
            b.to_async(&runtime).iter(|| {
                let mut dispatcher = Dispatcher::new(Arc::clone(&registry));
                async move { black_box(dispatcher.dispatch(pdu).await) }
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_encode_response,
    bench_decode_request,
    bench_dispatch_get_next,
);
criterion_main!(benches);
