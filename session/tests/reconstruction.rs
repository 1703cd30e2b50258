/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::Arc;

use driver::{command, error::DriverError};
use options::{SessionOptions, TransactionOptions};
use session::{
    client_session::ClientSessionState,
    error::SessionError,
    factory::{ClientSessionFactory, PlainClientSessionFactory, TxnClientSessionFactory},
    gateway::{DatabaseGateway, ProbeNamespace},
    options_pool::SessionOptionsPool,
    session_id::SessionId,
    txn::{TransactionStatus, Txn},
    txn_probe::{propagate, reconstruct},
};
use test_utils::{init_logging, FakeDatabase, FakeTopology, FakeTxnState, MessageDialect};

fn gateway(database: &Arc<FakeDatabase>) -> DatabaseGateway {
    DatabaseGateway::new(
        database.clone(),
        Arc::new(SessionOptionsPool::new(64)),
        TransactionOptions::default(),
        ProbeNamespace::default(),
    )
}

/// Starts transaction `txn_id` on the database the way a new transaction request does.
async fn start_transaction(gateway: &DatabaseGateway, session_id: SessionId, current: Txn) -> Txn {
    let next = Txn::new(current.next_id(), current.status);
    let mut session = ClientSessionState::create(gateway, session_id, SessionOptions::default(), Some(next));
    session.set_message_sent_in_current_transaction(false);
    session.start_transaction().unwrap();
    propagate(gateway, &mut session).await.unwrap();
    session.txn()
}

async fn commit(gateway: &DatabaseGateway, session_id: SessionId, txn_id: i64) {
    let factory = TxnClientSessionFactory::new(gateway.clone());
    let mut session = factory.txn_client_session(session_id, Txn::in_progress(txn_id)).unwrap();
    session.commit_transaction().await.unwrap();
}

async fn abort(gateway: &DatabaseGateway, session_id: SessionId, txn_id: i64) {
    let factory = TxnClientSessionFactory::new(gateway.clone());
    let mut session = factory.txn_client_session(session_id, Txn::in_progress(txn_id)).unwrap();
    session.abort_transaction().await.unwrap();
}

#[tokio::test]
async fn fresh_session_has_no_transaction() {
    init_logging();
    let database = Arc::new(FakeDatabase::replica_set());
    let gateway = gateway(&database);
    let txn = reconstruct(&gateway, SessionId::new_random()).await.unwrap();
    assert_eq!(txn, Txn::new(1, TransactionStatus::None));
}

#[tokio::test]
async fn started_transaction_is_in_progress() {
    init_logging();
    let database = Arc::new(FakeDatabase::replica_set());
    let gateway = gateway(&database);
    let session_id = SessionId::new_random();

    let current = reconstruct(&gateway, session_id).await.unwrap();
    let started = start_transaction(&gateway, session_id, current).await;
    assert_eq!(started, Txn::in_progress(1));
    assert_eq!(reconstruct(&gateway, session_id).await.unwrap(), Txn::in_progress(1));
    assert_eq!(database.transaction(&session_id.to_wire_identifier()), Some((1, Some(FakeTxnState::InProgress))));

    let starts = database.commands_named(command::FIND);
    assert!(starts.iter().filter(|find| find.body.get_bool("startTransaction").unwrap_or(false)).count() == 1);
}

#[tokio::test]
async fn settled_transactions_are_recognised() {
    init_logging();
    let database = Arc::new(FakeDatabase::replica_set());
    let gateway = gateway(&database);
    let session_id = SessionId::new_random();

    let current = reconstruct(&gateway, session_id).await.unwrap();
    start_transaction(&gateway, session_id, current).await;
    commit(&gateway, session_id, 1).await;
    assert_eq!(reconstruct(&gateway, session_id).await.unwrap(), Txn::new(1, TransactionStatus::Committed));

    let current = reconstruct(&gateway, session_id).await.unwrap();
    assert_eq!(start_transaction(&gateway, session_id, current).await, Txn::in_progress(2));
    abort(&gateway, session_id, 2).await;
    assert_eq!(reconstruct(&gateway, session_id).await.unwrap(), Txn::new(2, TransactionStatus::Aborted));
}

#[tokio::test]
async fn transaction_numbers_only_increase() {
    init_logging();
    let database = Arc::new(FakeDatabase::replica_set());
    let gateway = gateway(&database);
    let session_id = SessionId::new_random();

    let mut previous = 0;
    for round in 0..6 {
        let current = reconstruct(&gateway, session_id).await.unwrap();
        let started = start_transaction(&gateway, session_id, current).await;
        assert!(started.id > previous, "round {round}: {started} did not advance past {previous}");
        previous = started.id;
        if round % 2 == 0 {
            commit(&gateway, session_id, started.id).await;
        } else {
            abort(&gateway, session_id, started.id).await;
        }
    }
    assert_eq!(previous, 6);
    assert_eq!(reconstruct(&gateway, session_id).await.unwrap(), Txn::new(6, TransactionStatus::Aborted));
}

#[tokio::test]
async fn any_process_recovers_the_same_state() {
    init_logging();
    let database = Arc::new(FakeDatabase::replica_set());
    let first_process = gateway(&database);
    let second_process = gateway(&database);
    let session_id = SessionId::new_random();

    for _ in 0..3 {
        let current = reconstruct(&first_process, session_id).await.unwrap();
        let started = start_transaction(&first_process, session_id, current).await;
        commit(&first_process, session_id, started.id).await;
    }
    let current = reconstruct(&first_process, session_id).await.unwrap();
    start_transaction(&first_process, session_id, current).await;

    assert_eq!(reconstruct(&second_process, session_id).await.unwrap(), Txn::in_progress(4));
    commit(&second_process, session_id, 4).await;
    assert_eq!(reconstruct(&first_process, session_id).await.unwrap(), Txn::new(4, TransactionStatus::Committed));
}

#[tokio::test]
async fn txn_number_qualified_messages_are_understood() {
    init_logging();
    let database = Arc::new(FakeDatabase::new(FakeTopology::ReplicaSet, MessageDialect::TxnNumberQualified));
    let gateway = gateway(&database);
    let session_id = SessionId::new_random();

    for _ in 0..2 {
        let current = reconstruct(&gateway, session_id).await.unwrap();
        let started = start_transaction(&gateway, session_id, current).await;
        abort(&gateway, session_id, started.id).await;
    }
    assert_eq!(reconstruct(&gateway, session_id).await.unwrap(), Txn::new(2, TransactionStatus::Aborted));
}

#[tokio::test]
async fn reconstruction_never_reports_transactions_unsupported() {
    init_logging();
    let standalone = Arc::new(FakeDatabase::standalone());
    let standalone_gateway = gateway(&standalone);
    let database = Arc::new(FakeDatabase::replica_set());
    let gateway = gateway(&database);
    let session_id = SessionId::new_random();

    let mut seen = vec![reconstruct(&gateway, session_id).await.unwrap()];
    let started = start_transaction(&gateway, session_id, seen[0]).await;
    seen.push(reconstruct(&gateway, session_id).await.unwrap());
    commit(&gateway, session_id, started.id).await;
    seen.push(reconstruct(&gateway, session_id).await.unwrap());
    let started = start_transaction(&gateway, session_id, seen[2]).await;
    abort(&gateway, session_id, started.id).await;
    seen.push(reconstruct(&gateway, session_id).await.unwrap());
    assert!(seen.iter().all(|txn| *txn != Txn::unsupported() && txn.id >= 1), "{seen:?}");

    let outcome = reconstruct(&standalone_gateway, SessionId::new_random()).await;
    assert!(outcome.map_or(true, |txn| txn != Txn::unsupported()));
}

#[tokio::test]
async fn unrecognised_errors_propagate_unchanged() {
    init_logging();
    let database = Arc::new(FakeDatabase::replica_set());
    let gateway = gateway(&database);
    let failure = DriverError::command(11600, "InterruptedAtShutdown", "interrupted at shutdown");
    database.fail_next(command::FIND, failure.clone());

    let error = reconstruct(&gateway, SessionId::new_random()).await.unwrap_err();
    assert_eq!(error.driver_error(), Some(&failure));
}

#[tokio::test]
async fn unrecognised_error_on_retry_propagates() {
    init_logging();
    let database = Arc::new(FakeDatabase::replica_set());
    let gateway = gateway(&database);
    let session_id = SessionId::new_random();
    for _ in 0..2 {
        let current = reconstruct(&gateway, session_id).await.unwrap();
        let started = start_transaction(&gateway, session_id, current).await;
        commit(&gateway, session_id, started.id).await;
    }

    let first = DriverError::command(
        225,
        "TransactionTooOld",
        "Cannot start transaction 1 on session x because a newer transaction 2 has already started.",
    );
    let second = DriverError::Connection { details: "connection reset".to_owned() };
    database.fail_next(command::FIND, first);
    database.fail_next(command::FIND, second.clone());
    let error = reconstruct(&gateway, session_id).await.unwrap_err();
    assert_eq!(error.driver_error(), Some(&second));
}

#[tokio::test]
async fn plain_sessions_reject_transaction_ids() {
    init_logging();
    let database = Arc::new(FakeDatabase::standalone());
    let factory = PlainClientSessionFactory::new(gateway(&database));
    let session_id = SessionId::new_random().to_string();

    assert!(matches!(factory.client_session(&session_id, Some("1")), Err(SessionError::TransactionsNotEnabled {})));
    let session = factory.client_session(&session_id, None).unwrap();
    assert_eq!(session.status(), TransactionStatus::None);
    assert!(matches!(factory.client_session("nope", None), Err(SessionError::InvalidSessionId { .. })));
}

#[tokio::test]
async fn transactional_sessions_resume_the_given_transaction() {
    init_logging();
    let database = Arc::new(FakeDatabase::replica_set());
    let factory = TxnClientSessionFactory::new(gateway(&database));
    let session_id = SessionId::new_random();

    let session = factory.client_session(&session_id.to_string(), Some("3")).unwrap();
    assert_eq!(session.txn(), Txn::in_progress(3));
    assert!(session.is_message_sent_in_current_transaction());
    assert!(session.is_transacted());
    assert!(matches!(
        factory.client_session(&session_id.to_string(), Some("three")),
        Err(SessionError::InvalidTransactionId { .. })
    ));
}
