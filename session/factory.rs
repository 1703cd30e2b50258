/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt::Debug;

use crate::{
    client_session::ClientSessionState,
    error::SessionError,
    gateway::DatabaseGateway,
    session_id::{parse_txn_id, SessionId},
    txn::Txn,
};

/// Turns the `sid`/`txn` values of a request into the session its database operations run in.
pub trait ClientSessionFactory: Debug + Send + Sync {
    fn client_session(&self, session_id: &str, txn_id: Option<&str>) -> Result<ClientSessionState, SessionError>;

    fn supports_transactions(&self) -> bool;
}

/// Used while transactions are not activated: sessions never carry transaction fields.
#[derive(Debug, Clone)]
pub struct PlainClientSessionFactory {
    gateway: DatabaseGateway,
}

impl PlainClientSessionFactory {
    pub fn new(gateway: DatabaseGateway) -> Self {
        Self { gateway }
    }
}

impl ClientSessionFactory for PlainClientSessionFactory {
    fn client_session(&self, session_id: &str, txn_id: Option<&str>) -> Result<ClientSessionState, SessionError> {
        if txn_id.is_some() {
            return Err(SessionError::TransactionsNotEnabled {});
        }
        let session_id: SessionId = session_id.parse()?;
        let options = self.gateway.options_pool().options_for(&session_id);
        Ok(ClientSessionState::create(&self.gateway, session_id, options, None))
    }

    fn supports_transactions(&self) -> bool {
        false
    }
}

/// Installed once the deployment is known to support transactions.
#[derive(Debug, Clone)]
pub struct TxnClientSessionFactory {
    gateway: DatabaseGateway,
}

impl TxnClientSessionFactory {
    pub fn new(gateway: DatabaseGateway) -> Self {
        Self { gateway }
    }

    /// A session resuming `txn`, assumed already started on the database.
    pub fn txn_client_session(&self, session_id: SessionId, txn: Txn) -> Result<ClientSessionState, SessionError> {
        let options = self.gateway.options_pool().options_for(&session_id);
        let mut session = ClientSessionState::create(&self.gateway, session_id, options, Some(txn));
        session.set_message_sent_in_current_transaction(true);
        if !session.has_active_transaction() {
            session.start_transaction()?;
        }
        Ok(session)
    }
}

impl ClientSessionFactory for TxnClientSessionFactory {
    fn client_session(&self, session_id: &str, txn_id: Option<&str>) -> Result<ClientSessionState, SessionError> {
        let session_id: SessionId = session_id.parse()?;
        match txn_id {
            Some(txn_id) => self.txn_client_session(session_id, Txn::in_progress(parse_txn_id(txn_id)?)),
            None => {
                let options = self.gateway.options_pool().options_for(&session_id);
                Ok(ClientSessionState::create(&self.gateway, session_id, options, None))
            }
        }
    }

    fn supports_transactions(&self) -> bool {
        true
    }
}
