/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use driver::{
    bson::{Bson, Document, Timestamp},
    command::{self, field},
    error::DriverError,
    ArcDatabaseClient, Command,
};
use options::{ReadConcern, SessionOptions, TransactionOptions, WriteConcern};
use tracing::{debug, trace};

use crate::{
    error::SessionError,
    gateway::DatabaseGateway,
    server_session::ServerSession,
    session_id::SessionId,
    txn::{TransactionStatus, Txn},
};

/// One request's view of a session.
///
/// Built from nothing but the session id, the options it was minted with and (optionally) a
/// transaction id supplied by the caller, then discarded at the end of the request. All commands
/// of the request go through [`ClientSessionState::execute`], which tags them with the session's
/// `lsid` and, inside a transaction, with the transaction fields.
#[derive(Debug)]
pub struct ClientSessionState {
    session_id: SessionId,
    options: SessionOptions,
    server_session: ServerSession,
    client: ArcDatabaseClient,
    transaction_defaults: TransactionOptions,
    transaction_options: Option<TransactionOptions>,
    status: TransactionStatus,
    message_sent_in_current_transaction: bool,
    commit_in_progress: bool,
    transacted: bool,
    operation_time: Option<Timestamp>,
}

impl ClientSessionState {
    /// With `txn`, the session resumes that transaction: its number and status are taken as given
    /// and the transaction is treated as already started on the database.
    pub fn create(gateway: &DatabaseGateway, session_id: SessionId, options: SessionOptions, txn: Option<Txn>) -> Self {
        let mut state = Self {
            session_id,
            options,
            server_session: ServerSession::new(&session_id),
            client: gateway.client().clone(),
            transaction_defaults: gateway.transaction_defaults().clone(),
            transaction_options: None,
            status: TransactionStatus::None,
            message_sent_in_current_transaction: false,
            commit_in_progress: false,
            transacted: false,
            operation_time: None,
        };
        if let Some(txn) = txn {
            state.server_session.set_transaction_number(txn.id);
            state.status = txn.status;
            if txn.status != TransactionStatus::None {
                state.transaction_options = Some(state.transaction_defaults.clone());
            }
            state.message_sent_in_current_transaction = true;
            state.transacted = true;
        }
        state
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn server_session(&self) -> &ServerSession {
        &self.server_session
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn transaction_number(&self) -> i64 {
        self.server_session.transaction_number()
    }

    pub fn txn(&self) -> Txn {
        Txn::new(self.transaction_number(), self.status)
    }

    /// True when this session was created to resume a transaction.
    pub fn is_transacted(&self) -> bool {
        self.transacted
    }

    pub fn transaction_options(&self) -> Option<&TransactionOptions> {
        self.transaction_options.as_ref()
    }

    pub fn operation_time(&self) -> Option<Timestamp> {
        self.operation_time
    }

    pub fn set_server_session_transaction_number(&mut self, transaction_number: i64) {
        self.server_session.set_transaction_number(transaction_number);
    }

    pub fn is_message_sent_in_current_transaction(&self) -> bool {
        self.message_sent_in_current_transaction
    }

    pub fn set_message_sent_in_current_transaction(&mut self, message_sent: bool) {
        self.message_sent_in_current_transaction = message_sent;
    }

    pub fn has_active_transaction(&self) -> bool {
        self.status == TransactionStatus::InProgress
            || (self.status == TransactionStatus::Committed && self.commit_in_progress)
    }

    pub fn start_transaction(&mut self) -> Result<(), SessionError> {
        self.start_transaction_with(TransactionOptions::default())
    }

    pub fn start_transaction_with(&mut self, options: TransactionOptions) -> Result<(), SessionError> {
        if self.status == TransactionStatus::InProgress {
            return Err(SessionError::IllegalState { description: "Transaction already in progress" });
        }
        let options = options.merge(&self.transaction_defaults);
        match &options.write_concern {
            None => return Err(SessionError::MissingWriteConcern {}),
            Some(write_concern) if !write_concern.is_acknowledged() => {
                return Err(SessionError::UnsupportedWriteConcern {})
            }
            Some(_) => (),
        }
        if self.status == TransactionStatus::Committed {
            self.clean_up_transaction(TransactionStatus::InProgress);
        } else {
            self.status = TransactionStatus::InProgress;
        }
        self.transaction_options = Some(options);
        Ok(())
    }

    /// Commits on the database only if this transaction has actually sent something. The status is
    /// COMMITTED afterwards even if the database rejected the commit.
    pub async fn commit_transaction(&mut self) -> Result<(), SessionError> {
        match self.status {
            TransactionStatus::Aborted => {
                return Err(SessionError::IllegalState {
                    description: "Cannot call commitTransaction after calling abortTransaction",
                })
            }
            TransactionStatus::None => {
                return Err(SessionError::IllegalState { description: "There is no transaction started" })
            }
            TransactionStatus::Committed => {
                return Err(SessionError::IllegalState { description: "Transaction already committed" })
            }
            TransactionStatus::InProgress => (),
        }
        if !self.message_sent_in_current_transaction {
            self.status = TransactionStatus::Committed;
            return Ok(());
        }
        let commit = command::commit_transaction(&self.transaction_write_concern()?)?;
        self.commit_in_progress = true;
        let result = self.execute(commit).await;
        self.commit_in_progress = false;
        self.status = TransactionStatus::Committed;
        result.map(|_| ()).map_err(SessionError::from)
    }

    /// Failures of the database-side abort are logged and dropped: the transaction is ABORTED either way.
    pub async fn abort_transaction(&mut self) -> Result<(), SessionError> {
        match self.status {
            TransactionStatus::Aborted => {
                return Err(SessionError::IllegalState { description: "Cannot call abortTransaction twice" })
            }
            TransactionStatus::Committed => {
                return Err(SessionError::IllegalState {
                    description: "Cannot call abortTransaction after calling commitTransaction",
                })
            }
            TransactionStatus::None => {
                return Err(SessionError::IllegalState { description: "There is no transaction started" })
            }
            TransactionStatus::InProgress => (),
        }
        if self.message_sent_in_current_transaction {
            let abort = command::abort_transaction(&self.transaction_write_concern()?)?;
            if let Err(error) = self.execute(abort).await {
                debug!("Ignoring failed abort of {} on session {}: {}", self.txn(), self.session_id, error);
            }
        }
        self.clean_up_transaction(TransactionStatus::Aborted);
        Ok(())
    }

    /// Called once for every command this session sends. Returns true only for the first command
    /// of the active transaction, which is the one that must carry `startTransaction`.
    pub fn notify_message_sent(&mut self) -> bool {
        if self.has_active_transaction() {
            let first_message = !self.message_sent_in_current_transaction;
            self.message_sent_in_current_transaction = true;
            first_message
        } else {
            if matches!(self.status, TransactionStatus::Committed | TransactionStatus::Aborted) {
                self.clean_up_transaction(TransactionStatus::None);
            }
            false
        }
    }

    pub async fn execute(&mut self, command: Command) -> Result<Document, DriverError> {
        let command = self.tag_command(command);
        trace!("Session {} sending '{}' at {}", self.session_id, command.name(), self.txn());
        let reply = self.client.execute(command).await?;
        self.advance_operation_time(&reply);
        Ok(reply)
    }

    /// Releases this request's hold on the session. The database-side session and any open
    /// transaction are untouched: other requests may still be using them.
    pub fn close(&mut self) {
        self.server_session.close();
        trace!("Closed client session {} at {}", self.session_id, self.txn());
    }

    fn tag_command(&mut self, mut command: Command) -> Command {
        let is_read = command.name() == command::FIND;
        command.body.insert(field::LSID, self.server_session.identifier().clone());
        let first_message = self.notify_message_sent();
        if self.has_active_transaction() {
            command.body.insert(field::TXN_NUMBER, Bson::Int64(self.server_session.transaction_number()));
            if first_message {
                command.body.insert(field::START_TRANSACTION, true);
                let level = self.transaction_options.as_ref().and_then(|options| options.read_concern);
                if let Some(read_concern) = self.read_concern_document(level) {
                    command.body.insert(field::READ_CONCERN, read_concern);
                }
            }
            command.body.insert(field::AUTOCOMMIT, false);
            if let Some(read_preference) = self.transaction_options.as_ref().and_then(|options| options.read_preference)
            {
                command = command.with_read_preference(read_preference);
            }
        } else if is_read {
            if let Some(read_concern) = self.read_concern_document(None) {
                command.body.insert(field::READ_CONCERN, read_concern);
            }
        }
        command
    }

    fn read_concern_document(&self, read_concern: Option<ReadConcern>) -> Option<Document> {
        let mut document = read_concern.map(|read_concern| command::read_concern_document(&read_concern)).unwrap_or_default();
        if self.options.causally_consistent {
            if let Some(operation_time) = self.operation_time {
                document.insert(field::AFTER_CLUSTER_TIME, operation_time);
            }
        }
        (!document.is_empty()).then_some(document)
    }

    fn advance_operation_time(&mut self, reply: &Document) {
        let Ok(operation_time) = reply.get_timestamp(field::OPERATION_TIME) else {
            return;
        };
        let is_newer = match self.operation_time {
            None => true,
            Some(current) => (operation_time.time, operation_time.increment) > (current.time, current.increment),
        };
        if is_newer {
            self.operation_time = Some(operation_time);
        }
    }

    fn transaction_write_concern(&self) -> Result<WriteConcern, SessionError> {
        self.transaction_options
            .as_ref()
            .and_then(|options| options.write_concern.clone())
            .or_else(|| self.transaction_defaults.write_concern.clone())
            .ok_or(SessionError::MissingWriteConcern {})
    }

    fn clean_up_transaction(&mut self, next_status: TransactionStatus) {
        self.message_sent_in_current_transaction = false;
        self.transaction_options = None;
        self.status = next_status;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use driver::{bson::doc, DatabaseClient};
    use options::{ReadConcernLevel, ReadPreference};

    use super::*;
    use crate::{gateway::ProbeNamespace, options_pool::SessionOptionsPool};

    #[derive(Debug, Default)]
    struct RecordingClient {
        sent: Mutex<Vec<Command>>,
        failure: Option<DriverError>,
    }

    impl RecordingClient {
        fn failing(failure: DriverError) -> Self {
            Self { sent: Mutex::default(), failure: Some(failure) }
        }

        fn sent(&self) -> Vec<Command> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DatabaseClient for RecordingClient {
        async fn execute(&self, command: Command) -> Result<Document, DriverError> {
            let sequence = {
                let mut sent = self.sent.lock().unwrap();
                sent.push(command);
                sent.len() as u32
            };
            match &self.failure {
                Some(failure) => Err(failure.clone()),
                None => Ok(doc! { "ok": 1, "operationTime": Timestamp { time: 100, increment: sequence } }),
            }
        }
    }

    fn gateway(client: Arc<RecordingClient>, defaults: TransactionOptions) -> DatabaseGateway {
        DatabaseGateway::new(client, Arc::new(SessionOptionsPool::new(16)), defaults, ProbeNamespace::default())
    }

    fn probe() -> Command {
        ProbeNamespace::default().probe()
    }

    #[tokio::test]
    async fn illegal_transitions_are_rejected() {
        let gateway = gateway(Arc::new(RecordingClient::default()), TransactionOptions::default());
        let mut session = ClientSessionState::create(&gateway, SessionId::new_random(), SessionOptions::default(), None);
        assert!(matches!(session.commit_transaction().await, Err(SessionError::IllegalState { .. })));
        assert!(matches!(session.abort_transaction().await, Err(SessionError::IllegalState { .. })));
        session.start_transaction().unwrap();
        assert!(matches!(session.start_transaction(), Err(SessionError::IllegalState { .. })));
    }

    #[tokio::test]
    async fn only_the_first_command_of_a_transaction_starts_it() {
        let client = Arc::new(RecordingClient::default());
        let gateway = gateway(client.clone(), TransactionOptions::default());
        let mut session = ClientSessionState::create(&gateway, SessionId::new_random(), SessionOptions::new(false), None);
        session.set_server_session_transaction_number(3);
        session.start_transaction().unwrap();
        session.execute(probe()).await.unwrap();
        session.execute(probe()).await.unwrap();

        let sent = client.sent();
        assert!(sent[0].body.get_bool(field::START_TRANSACTION).unwrap());
        assert!(sent[1].body.get(field::START_TRANSACTION).is_none());
        for command in &sent {
            assert_eq!(command.body.get_i64(field::TXN_NUMBER).unwrap(), 3);
            assert!(!command.body.get_bool(field::AUTOCOMMIT).unwrap());
            assert_eq!(command.body.get_document(field::LSID).unwrap(), &session.session_id().to_wire_identifier());
        }
    }

    #[tokio::test]
    async fn commit_without_messages_stays_local() {
        let client = Arc::new(RecordingClient::default());
        let gateway = gateway(client.clone(), TransactionOptions::default());
        let mut session = ClientSessionState::create(&gateway, SessionId::new_random(), SessionOptions::default(), None);
        session.start_transaction().unwrap();
        session.commit_transaction().await.unwrap();
        assert_eq!(session.status(), TransactionStatus::Committed);
        assert!(client.sent().is_empty());
        assert!(matches!(session.commit_transaction().await, Err(SessionError::IllegalState { .. })));
    }

    #[tokio::test]
    async fn commit_is_sent_with_the_transaction_write_concern() {
        let client = Arc::new(RecordingClient::default());
        let gateway = gateway(client.clone(), TransactionOptions::default());
        let mut session =
            ClientSessionState::create(&gateway, SessionId::new_random(), SessionOptions::default(), Some(Txn::in_progress(7)));
        session.commit_transaction().await.unwrap();

        let sent = client.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name(), command::COMMIT_TRANSACTION);
        assert_eq!(sent[0].body.get_document("writeConcern").unwrap(), &doc! { "w": "majority" });
        assert_eq!(sent[0].body.get_i64(field::TXN_NUMBER).unwrap(), 7);
        assert!(sent[0].body.get(field::START_TRANSACTION).is_none());
    }

    #[tokio::test]
    async fn commit_failure_still_settles_the_transaction() {
        let failure = DriverError::command(251, "NoSuchTransaction", "Transaction 7 has been aborted.");
        let client = Arc::new(RecordingClient::failing(failure.clone()));
        let gateway = gateway(client, TransactionOptions::default());
        let mut session =
            ClientSessionState::create(&gateway, SessionId::new_random(), SessionOptions::default(), Some(Txn::in_progress(7)));
        let error = session.commit_transaction().await.unwrap_err();
        assert_eq!(error.driver_error(), Some(&failure));
        assert_eq!(session.status(), TransactionStatus::Committed);
    }

    #[tokio::test]
    async fn abort_swallows_database_failures() {
        let client = Arc::new(RecordingClient::failing(DriverError::Connection { details: "gone".to_owned() }));
        let gateway = gateway(client.clone(), TransactionOptions::default());
        let mut session =
            ClientSessionState::create(&gateway, SessionId::new_random(), SessionOptions::default(), Some(Txn::in_progress(2)));
        session.abort_transaction().await.unwrap();
        assert_eq!(session.status(), TransactionStatus::Aborted);
        assert_eq!(client.sent()[0].name(), command::ABORT_TRANSACTION);
        assert!(!session.is_message_sent_in_current_transaction());
        assert!(matches!(session.abort_transaction().await, Err(SessionError::IllegalState { .. })));
    }

    #[test]
    fn unacknowledged_write_concern_cannot_start_a_transaction() {
        let gateway = gateway(Arc::new(RecordingClient::default()), TransactionOptions::default());
        let mut session = ClientSessionState::create(&gateway, SessionId::new_random(), SessionOptions::default(), None);
        let options = TransactionOptions::new(None, Some(WriteConcern::unacknowledged()), None);
        assert!(matches!(session.start_transaction_with(options), Err(SessionError::UnsupportedWriteConcern {})));
        assert_eq!(session.status(), TransactionStatus::None);
    }

    #[test]
    fn a_settled_transaction_is_cleared_by_the_next_message() {
        let gateway = gateway(Arc::new(RecordingClient::default()), TransactionOptions::default());
        let mut session = ClientSessionState::create(
            &gateway,
            SessionId::new_random(),
            SessionOptions::default(),
            Some(Txn::new(4, TransactionStatus::Committed)),
        );
        assert!(!session.notify_message_sent());
        assert_eq!(session.status(), TransactionStatus::None);
        assert!(!session.is_message_sent_in_current_transaction());
    }

    #[test]
    fn starting_after_a_commit_resets_the_transaction() {
        let gateway = gateway(Arc::new(RecordingClient::default()), TransactionOptions::default());
        let mut session = ClientSessionState::create(
            &gateway,
            SessionId::new_random(),
            SessionOptions::default(),
            Some(Txn::new(4, TransactionStatus::Committed)),
        );
        assert!(session.is_message_sent_in_current_transaction());
        session.start_transaction().unwrap();
        assert_eq!(session.status(), TransactionStatus::InProgress);
        assert!(!session.is_message_sent_in_current_transaction());
        assert!(session.notify_message_sent());
        assert!(!session.notify_message_sent());
    }

    #[tokio::test]
    async fn causal_reads_wait_for_the_last_seen_operation() {
        let client = Arc::new(RecordingClient::default());
        let gateway = gateway(client.clone(), TransactionOptions::default());
        let mut session = ClientSessionState::create(&gateway, SessionId::new_random(), SessionOptions::new(true), None);
        session.execute(probe()).await.unwrap();
        session.execute(probe()).await.unwrap();

        let sent = client.sent();
        assert!(sent[0].body.get(field::READ_CONCERN).is_none());
        assert_eq!(
            sent[1].body.get_document(field::READ_CONCERN).unwrap(),
            &doc! { "afterClusterTime": Timestamp { time: 100, increment: 1 } }
        );
        assert!(sent[1].body.get(field::TXN_NUMBER).is_none());
    }

    #[tokio::test]
    async fn inconsistent_sessions_never_wait() {
        let client = Arc::new(RecordingClient::default());
        let gateway = gateway(client.clone(), TransactionOptions::default());
        let mut session = ClientSessionState::create(&gateway, SessionId::new_random(), SessionOptions::new(false), None);
        session.execute(probe()).await.unwrap();
        session.execute(probe()).await.unwrap();
        assert!(client.sent().iter().all(|command| command.body.get(field::READ_CONCERN).is_none()));
    }

    #[tokio::test]
    async fn transaction_options_shape_the_first_command() {
        let client = Arc::new(RecordingClient::default());
        let defaults = TransactionOptions::new(
            Some(ReadConcern::new(ReadConcernLevel::Snapshot)),
            None,
            Some(ReadPreference::PrimaryPreferred),
        );
        let gateway = gateway(client.clone(), defaults);
        let mut session = ClientSessionState::create(&gateway, SessionId::new_random(), SessionOptions::new(false), None);
        session.execute(probe()).await.unwrap();
        session.start_transaction().unwrap();
        session.execute(probe()).await.unwrap();
        let sent = client.sent();
        assert_eq!(sent[0].read_preference, ReadPreference::Primary);
        assert_eq!(sent[1].body.get_document(field::READ_CONCERN).unwrap(), &doc! { "level": "snapshot" });
        assert_eq!(sent[1].read_preference, ReadPreference::PrimaryPreferred);
        assert_eq!(session.transaction_options().unwrap().write_concern, Some(WriteConcern::majority()));
    }

    #[tokio::test]
    async fn out_of_range_write_concern_fails_before_sending() {
        let client = Arc::new(RecordingClient::default());
        let defaults = TransactionOptions::new(None, Some(WriteConcern::nodes(u32::MAX)), None);
        let gateway = gateway(client.clone(), defaults);
        let mut session =
            ClientSessionState::create(&gateway, SessionId::new_random(), SessionOptions::default(), Some(Txn::in_progress(6)));
        let error = session.commit_transaction().await.unwrap_err();
        assert_eq!(
            error.driver_error(),
            Some(&DriverError::InvalidWriteConcern { field: "w", value: u64::from(u32::MAX) })
        );
        assert_eq!(session.status(), TransactionStatus::InProgress);
        assert!(client.sent().is_empty());
    }

    #[test]
    fn close_leaves_the_transaction_alone() {
        let client = Arc::new(RecordingClient::default());
        let gateway = gateway(client.clone(), TransactionOptions::default());
        let mut session =
            ClientSessionState::create(&gateway, SessionId::new_random(), SessionOptions::default(), Some(Txn::in_progress(5)));
        session.close();
        assert!(session.server_session().is_closed());
        assert_eq!(session.status(), TransactionStatus::InProgress);
        assert!(client.sent().is_empty());
    }
}
