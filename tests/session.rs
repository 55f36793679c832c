//! Session lifecycle against a scripted master.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_agentx::codec::Flags;
use async_agentx::error::{LostReason, RegistrationErrorKind, ResponseError};
use async_agentx::handler::ScalarCell;
use async_agentx::pdu::{CloseReason, PduBody, PduType, ResponsePdu};
use async_agentx::session::IndexAllocation;
use async_agentx::{Error, SearchRange, Session, SessionState, Value, VarBind};
use common::*;

fn builder() -> async_agentx::SessionBuilder {
    Session::builder().description("session test")
}

async fn with_answer(master: &mut FakeMaster, session: &Session) -> Arc<ScalarCell> {
    let cell = Arc::new(ScalarCell::integer32(answer_oid(), 42));
    let (id, _) = tokio::join!(session.register_cell(Arc::clone(&cell)), master.accept_register());
    id.expect("registration accepted");
    cell
}

#[tokio::test]
async fn test_open_announces_identity() {
    let (mut master, stream) = FakeMaster::new();
    let builder = builder().timeout(Duration::from_secs(12));
    let (session, open) = tokio::join!(builder.open_stream(stream), master.accept_open());
    let session = session.unwrap();

    assert_eq!(open.timeout, 12);
    assert_eq!(&open.description[..], b"session test");
    assert!(open.id.is_empty());
    assert_eq!(session.session_id(), SESSION_ID);
    assert_eq!(session.state(), SessionState::Open);
}

#[tokio::test]
async fn test_open_refused() {
    let (mut master, stream) = FakeMaster::new();
    let (session, _) = tokio::join!(
        builder().open_stream(stream),
        master.refuse_open(ResponseError::OpenFailed)
    );
    assert!(matches!(
        session,
        Err(Error::OpenFailed {
            status: ResponseError::OpenFailed
        })
    ));
}

#[tokio::test]
async fn test_get_registered_scalar() {
    let (session, mut master) = FakeMaster::connect(builder()).await;
    with_answer(&mut master, &session).await;

    let resp = master
        .request(7, PduBody::Get(vec![SearchRange::exact(answer_oid())]))
        .await;
    assert_eq!(resp.error, ResponseError::NoError);
    assert_eq!(resp.varbinds, vec![VarBind::new(answer_oid(), Value::Integer(42))]);
}

#[tokio::test]
async fn test_get_unregistered_is_no_such_object() {
    let (session, mut master) = FakeMaster::connect(builder()).await;
    with_answer(&mut master, &session).await;

    let resp = master
        .request(8, PduBody::Get(vec![SearchRange::exact(unregistered_oid())]))
        .await;
    assert_eq!(resp.error, ResponseError::NoError);
    assert_eq!(
        resp.varbinds,
        vec![VarBind::new(unregistered_oid(), Value::NoSuchObject)]
    );
}

#[tokio::test]
async fn test_cell_updates_are_served() {
    let (session, mut master) = FakeMaster::connect(builder()).await;
    let cell = with_answer(&mut master, &session).await;
    cell.update(Value::Integer(-7)).unwrap();

    let resp = master
        .request(9, PduBody::Get(vec![SearchRange::exact(answer_oid())]))
        .await;
    assert_eq!(resp.varbinds[0].value, Value::Integer(-7));

    let values = session.registered_values();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].value, Value::Integer(-7));
}

#[tokio::test]
async fn test_duplicate_registration_keeps_first() {
    let (session, mut master) = FakeMaster::connect(builder()).await;
    with_answer(&mut master, &session).await;

    let again = Arc::new(ScalarCell::integer32(answer_oid(), 0));
    let err = session.register_cell(again).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Registration {
            kind: RegistrationErrorKind::Duplicate,
            ..
        }
    ));
    assert_eq!(session.registration_count(), 1);

    let resp = master
        .request(10, PduBody::Get(vec![SearchRange::exact(answer_oid())]))
        .await;
    assert_eq!(resp.varbinds[0].value, Value::Integer(42));
}

#[tokio::test]
async fn test_master_refusal_removes_local_entry() {
    let (session, mut master) = FakeMaster::connect(builder()).await;

    let cell = Arc::new(ScalarCell::integer32(answer_oid(), 42));
    let (result, _) = tokio::join!(
        session.register_cell(cell),
        master.answer(PduType::Register, ResponseError::DuplicateRegistration)
    );
    assert!(matches!(
        result,
        Err(Error::Registration {
            kind: RegistrationErrorKind::Duplicate,
            ..
        })
    ));
    assert_eq!(session.registration_count(), 0);
    assert!(session.registered_values().is_empty());

    let resp = master
        .request(11, PduBody::Get(vec![SearchRange::exact(answer_oid())]))
        .await;
    assert_eq!(resp.varbinds[0].value, Value::NoSuchObject);
}

#[tokio::test]
async fn test_unregister_sends_pdu_and_forgets() {
    let (session, mut master) = FakeMaster::connect(builder()).await;
    let cell = Arc::new(ScalarCell::integer32(answer_oid(), 42));
    let (id, register) = tokio::join!(session.register_cell(cell), master.accept_register());
    let id = id.unwrap();

    let (result, unregister) = tokio::join!(
        session.unregister(id),
        master.answer(PduType::Unregister, ResponseError::NoError)
    );
    result.unwrap();
    match (register.body, unregister.body) {
        (PduBody::Register(reg), PduBody::Unregister(unreg)) => {
            assert_eq!(reg.subtree, unreg.subtree);
            assert_eq!(reg.priority, unreg.priority);
        }
        other => panic!("unexpected bodies {:?}", other),
    }
    assert_eq!(session.registration_count(), 0);
    assert!(matches!(
        session.unregister(id).await,
        Err(Error::Registration {
            kind: RegistrationErrorKind::UnknownRegistration,
            ..
        })
    ));
}

#[tokio::test]
async fn test_local_close() {
    let (session, mut master) = FakeMaster::connect(builder()).await;

    let (result, close) = tokio::join!(
        session.close(CloseReason::Shutdown),
        master.answer(PduType::Close, ResponseError::NoError)
    );
    result.unwrap();
    match close.body {
        PduBody::Close(close) => assert_eq!(close.reason, CloseReason::Shutdown),
        other => panic!("expected Close, got {:?}", other),
    }
    assert_eq!(session.state(), SessionState::Closed);
    session.wait_closed().await.unwrap();
    assert!(matches!(
        session.close(CloseReason::Shutdown).await,
        Err(Error::NotOpen)
    ));
}

#[tokio::test]
async fn test_close_by_master() {
    let (session, mut master) = FakeMaster::connect(builder()).await;
    master.close(CloseReason::ByManager).await;

    let err = session.wait_closed().await.unwrap_err();
    assert!(matches!(
        err,
        Error::SessionLost {
            reason: LostReason::ClosedByMaster(CloseReason::ByManager)
        }
    ));
    assert_eq!(session.state(), SessionState::Closed);

    let cell = Arc::new(ScalarCell::integer32(answer_oid(), 42));
    assert!(matches!(
        session.register_cell(cell).await,
        Err(Error::SessionLost { .. })
    ));
}

#[tokio::test]
async fn test_disconnect_is_session_lost() {
    let (session, master) = FakeMaster::connect(builder()).await;
    drop(master);

    assert!(matches!(
        session.wait_closed().await,
        Err(Error::SessionLost {
            reason: LostReason::Disconnected
        })
    ));
}

#[tokio::test]
async fn test_malformed_pdu_closes_with_parse_error() {
    let (session, mut master) = FakeMaster::connect(builder()).await;

    // Valid header, Get payload holding a 200-arc OID
    let mut frame = vec![1, 5, 0x10, 0];
    frame.extend_from_slice(&SESSION_ID.to_be_bytes());
    frame.extend_from_slice(&1u32.to_be_bytes());
    frame.extend_from_slice(&1u32.to_be_bytes());
    frame.extend_from_slice(&4u32.to_be_bytes());
    frame.extend_from_slice(&[200, 0, 0, 0]);
    master.send_raw(&frame).await;

    let close = master.expect(PduType::Close).await;
    match close.body {
        PduBody::Close(close) => assert_eq!(close.reason, CloseReason::ParseError),
        other => panic!("expected Close, got {:?}", other),
    }
    assert!(matches!(
        session.wait_closed().await,
        Err(Error::SessionLost {
            reason: LostReason::ParseError
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_missed_pings_lose_the_session() {
    let (session, mut master) = FakeMaster::connect(
        builder()
            .timeout(Duration::from_secs(3))
            .ping_interval(Duration::from_secs(1))
            .max_missed_pings(3),
    )
    .await;

    // Read the pings but never answer them
    let mut pings = 0;
    let close = loop {
        let pdu = master.recv().await.expect("subagent still connected");
        match pdu.pdu_type() {
            PduType::Ping => pings += 1,
            PduType::Close => break pdu,
            other => panic!("unexpected {}", other),
        }
    };
    assert_eq!(pings, 3);
    match close.body {
        PduBody::Close(close) => assert_eq!(close.reason, CloseReason::Timeouts),
        other => panic!("expected Close, got {:?}", other),
    }

    assert!(matches!(
        session.wait_closed().await,
        Err(Error::SessionLost {
            reason: LostReason::MissedPings { count: 3 }
        })
    ));
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_answered_pings_keep_session_open() {
    let (session, mut master) = FakeMaster::connect(
        builder()
            .ping_interval(Duration::from_secs(1))
            .max_missed_pings(1),
    )
    .await;
    with_answer(&mut master, &session).await;

    // Nothing but pings arrives in the meantime
    let idle = tokio::time::timeout(Duration::from_secs(5), master.next()).await;
    assert!(idle.is_err());
    let resp = master
        .request(12, PduBody::Get(vec![SearchRange::exact(answer_oid())]))
        .await;
    assert_eq!(resp.varbinds[0].value, Value::Integer(42));
    assert!(master.pings_answered >= 1);
    assert!(session.state().is_open());
}

#[tokio::test]
async fn test_ping_round_trip() {
    let (session, mut master) = FakeMaster::connect(builder()).await;
    let answer = async {
        let ping = master.recv().await.expect("ping");
        assert_eq!(ping.pdu_type(), PduType::Ping);
        master.respond(&ping, ResponsePdu::ok(Vec::new())).await;
    };
    let (rtt, _) = tokio::join!(session.ping(), answer);
    assert!(rtt.is_ok());
}

#[tokio::test]
async fn test_notify_is_acknowledged() {
    let (session, mut master) = FakeMaster::connect(builder()).await;
    let trap = vec![VarBind::new(
        async_agentx::oid!(1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0),
        Value::ObjectIdentifier(enterprise().child(0).child(1)),
    )];

    let (result, notify) = tokio::join!(
        session.notify(trap.clone()),
        master.answer(PduType::Notify, ResponseError::NoError)
    );
    result.unwrap();
    assert_eq!(notify.header.session_id, SESSION_ID);
    match notify.body {
        PduBody::Notify(varbinds) => assert_eq!(varbinds, trap),
        other => panic!("expected Notify, got {:?}", other),
    }
}

#[tokio::test]
async fn test_notify_refused_is_error_response() {
    let (session, mut master) = FakeMaster::connect(builder()).await;
    let (result, _) = tokio::join!(
        session.notify(Vec::new()),
        master.answer(PduType::Notify, ResponseError::ProcessingError)
    );
    assert!(matches!(result, Err(Error::Protocol { .. })));
    assert!(session.state().is_open());
}

#[tokio::test]
async fn test_index_allocate_returns_master_choice() {
    let (session, mut master) = FakeMaster::connect(builder()).await;
    let index = enterprise().extend(&[9, 1]);
    let wanted = vec![VarBind::new(index.clone(), Value::Integer(0))];
    let chosen = vec![VarBind::new(index.clone(), Value::Integer(17))];

    let answer = async {
        let pdu = master.expect(PduType::IndexAllocate).await;
        assert!(pdu.header.flags.contains(Flags::ANY_INDEX));
        master.respond(&pdu, ResponsePdu::ok(chosen.clone())).await;
    };
    let (result, _) = tokio::join!(session.index_allocate(wanted, IndexAllocation::Any), answer);
    assert_eq!(result.unwrap(), chosen);

    let (result, dealloc) = tokio::join!(
        session.index_deallocate(chosen.clone()),
        master.answer(PduType::IndexDeallocate, ResponseError::NoError)
    );
    result.unwrap();
    assert!(matches!(dealloc.body, PduBody::IndexDeallocate(ref vbs) if *vbs == chosen));
}

#[tokio::test]
async fn test_agent_caps_round_trip() {
    let (session, mut master) = FakeMaster::connect(builder()).await;
    let caps = enterprise().child(99);

    let (result, add) = tokio::join!(
        session.add_agent_caps(caps.clone(), "example capabilities"),
        master.answer(PduType::AddAgentCaps, ResponseError::NoError)
    );
    result.unwrap();
    match add.body {
        PduBody::AddAgentCaps(add) => {
            assert_eq!(add.id, caps);
            assert_eq!(&add.description[..], b"example capabilities");
        }
        other => panic!("expected AddAgentCaps, got {:?}", other),
    }

    let (result, remove) = tokio::join!(
        session.remove_agent_caps(caps.clone()),
        master.answer(PduType::RemoveAgentCaps, ResponseError::UnknownAgentCaps)
    );
    assert!(result.is_err());
    assert!(matches!(remove.body, PduBody::RemoveAgentCaps(ref id) if *id == caps));
}

#[tokio::test]
async fn test_request_for_another_session_is_not_open() {
    let (session, mut master) = FakeMaster::connect(builder()).await;
    let cell = Arc::new(ScalarCell::integer32(answer_oid(), 42).writable());
    let (id, _) = tokio::join!(session.register_cell(Arc::clone(&cell)), master.accept_register());
    id.unwrap();

    master.session_id = 0xdead;
    let resp = master
        .request(13, PduBody::Get(vec![SearchRange::exact(answer_oid())]))
        .await;
    assert_eq!(resp.error, ResponseError::NotOpen);
    assert!(resp.varbinds.is_empty());

    let resp = master
        .request(14, PduBody::TestSet(vec![VarBind::new(answer_oid(), Value::Integer(7))]))
        .await;
    assert_eq!(resp.error, ResponseError::NotOpen);
    let resp = master.request(14, PduBody::CommitSet).await;
    assert_eq!(resp.error, ResponseError::NotOpen);
    assert_eq!(cell.value(), Value::Integer(42));

    master.session_id = SESSION_ID;
    let resp = master
        .request(15, PduBody::Get(vec![SearchRange::exact(answer_oid())]))
        .await;
    assert_eq!(resp.varbinds[0].value, Value::Integer(42));
    assert!(session.state().is_open());
}
