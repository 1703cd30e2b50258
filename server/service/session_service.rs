/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use driver::{command, error::DriverError, topology::Topology};
use error::docway_error;
use options::SessionOptions;
use resource::constants::database::error_code::{ILLEGAL_OPERATION, NO_SUCH_TRANSACTION, TRANSACTION_TOO_OLD};
use session::{
    client_session::ClientSessionState,
    error::SessionError,
    factory::TxnClientSessionFactory,
    gateway::DatabaseGateway,
    session_id::{parse_txn_id, SessionId},
    txn::{TransactionStatus, Txn},
    txn_probe::{propagate, reconstruct},
};
use tracing::{debug, error, info};

docway_error! {
    pub SessionServiceError(component = "Session service", prefix = "SSV") {
        SessionsUnsupported(1, "Sessions are not supported: the database is not a replica set.", ( docway_source: DriverError )),
        KillSessionFailed(2, "Could not end session '{session_id}'.", session_id: SessionId, ( docway_source: DriverError )),
        TransactionNotInProgress(3, "The given transaction is not in-progress: txn {txn_id} was requested but the session is at {current}.", txn_id: i64, current: Txn),
        CommitRejected(4, "Could not commit txn {txn_id}: {code_name}, {message}", txn_id: i64, code_name: String, message: String),
        CommitIllegalOperation(5, "{code_name}, {message}", code_name: String, message: String),
        Session(6, "Session error.", ( docway_source: SessionError )),
    }
}

impl SessionServiceError {
    /// The request named a session or transaction that cannot exist.
    pub(crate) fn is_invalid_identifier(&self) -> bool {
        matches!(
            self,
            Self::Session {
                docway_source: SessionError::InvalidSessionId { .. } | SessionError::InvalidTransactionId { .. }
            }
        )
    }
}

impl From<SessionError> for SessionServiceError {
    fn from(docway_source: SessionError) -> Self {
        Self::Session { docway_source }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum TransactionAdvance {
    Started(Txn),
    Unchanged(Txn),
}

/// Session and transaction lifecycle, independent of how requests arrive.
#[derive(Debug, Clone)]
pub(crate) struct SessionService {
    gateway: DatabaseGateway,
    topology: Option<Topology>,
}

impl SessionService {
    pub(crate) fn new(gateway: DatabaseGateway, topology: Option<Topology>) -> Self {
        Self { gateway, topology }
    }

    pub(crate) fn gateway(&self) -> &DatabaseGateway {
        &self.gateway
    }

    fn is_confirmed_standalone(&self) -> bool {
        matches!(self.topology, Some(Topology::Standalone))
    }

    pub(crate) async fn create_session(&self, options: SessionOptions) -> Result<SessionId, SessionServiceError> {
        let options_pool = self.gateway.options_pool();
        let session_id = options_pool.new_session_id(options);
        let mut session = ClientSessionState::create(&self.gateway, session_id, options, None);
        match propagate(&self.gateway, &mut session).await {
            Ok(()) => {
                debug!("Created session {session_id} with {options:?}");
                Ok(session_id)
            }
            Err(err) => {
                options_pool.forget(&session_id);
                match err {
                    SessionError::Driver { docway_source } if self.is_confirmed_standalone() => {
                        Err(SessionServiceError::SessionsUnsupported { docway_source })
                    }
                    err => Err(err.into()),
                }
            }
        }
    }

    pub(crate) async fn kill_session(&self, session_id: &str) -> Result<(), SessionServiceError> {
        let session_id: SessionId = session_id.parse()?;
        let end_sessions = command::end_sessions(vec![session_id.to_wire_identifier()]);
        self.gateway
            .client()
            .execute(end_sessions)
            .await
            .map_err(|docway_source| SessionServiceError::KillSessionFailed { session_id, docway_source })?;
        self.gateway.options_pool().forget(&session_id);
        debug!("Ended session {session_id}");
        Ok(())
    }

    pub(crate) async fn current_transaction(&self, session_id: &str) -> Result<Txn, SessionServiceError> {
        let session_id: SessionId = session_id.parse()?;
        Ok(reconstruct(&self.gateway, session_id).await?)
    }

    /// Starts the session's next transaction unless one is still unfinished.
    pub(crate) async fn advance_transaction(&self, session_id: &str) -> Result<TransactionAdvance, SessionServiceError> {
        let session_id: SessionId = session_id.parse()?;
        let current = reconstruct(&self.gateway, session_id).await?;
        if !current.status.is_settled() {
            debug!("Session {session_id} still has {current} open");
            return Ok(TransactionAdvance::Unchanged(current));
        }

        let options = self.gateway.options_pool().options_for(&session_id);
        let next = Txn::new(current.next_id(), current.status);
        let mut session = ClientSessionState::create(&self.gateway, session_id, options, Some(next));
        session.set_message_sent_in_current_transaction(false);
        session.start_transaction()?;
        propagate(&self.gateway, &mut session).await?;
        info!("Started txn {} on session {session_id}", session.transaction_number());
        Ok(TransactionAdvance::Started(session.txn()))
    }

    pub(crate) async fn commit_transaction(&self, session_id: &str, txn_id: &str) -> Result<(), SessionServiceError> {
        let session_id: SessionId = session_id.parse()?;
        let txn_id = parse_txn_id(txn_id)?;
        let current = reconstruct(&self.gateway, session_id).await?;
        if current.id != txn_id || current.status != TransactionStatus::InProgress {
            return Err(SessionServiceError::TransactionNotInProgress { txn_id, current });
        }

        let mut session = TxnClientSessionFactory::new(self.gateway.clone()).txn_client_session(session_id, current)?;
        session.commit_transaction().await.map_err(|err| Self::commit_error(err, txn_id))?;
        info!("Committed txn {txn_id} on session {session_id}");
        Ok(())
    }

    /// Optimistic: the transaction is assumed in progress and database failures are ignored.
    pub(crate) async fn abort_transaction(&self, session_id: &str, txn_id: &str) -> Result<(), SessionServiceError> {
        let session_id: SessionId = session_id.parse()?;
        let txn_id = parse_txn_id(txn_id)?;
        let mut session =
            TxnClientSessionFactory::new(self.gateway.clone()).txn_client_session(session_id, Txn::in_progress(txn_id))?;
        session.abort_transaction().await?;
        info!("Aborted txn {txn_id} on session {session_id}");
        Ok(())
    }

    fn commit_error(err: SessionError, txn_id: i64) -> SessionServiceError {
        let (code, code_name, message) = match err.driver_error() {
            Some(DriverError::Command { code, code_name, message }) => (*code, code_name.clone(), message.clone()),
            _ => return err.into(),
        };
        error!("Error committing txn {txn_id}: {code} ({code_name}), {message}");
        match code {
            ILLEGAL_OPERATION => SessionServiceError::CommitIllegalOperation { code_name, message },
            NO_SUCH_TRANSACTION | TRANSACTION_TOO_OLD => SessionServiceError::CommitRejected { txn_id, code_name, message },
            _ => err.into(),
        }
    }
}
