/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Recovering a session's transaction state from the database.
//!
//! Nothing about a session's transactions is kept between requests. Instead a cheap read is sent
//! as a continuation of a guessed transaction, and the database's answer (success, or one of a
//! few errors whose messages name the transaction it actually knows about) says where the
//! session really is.

use std::cmp::max;

use driver::error::DriverError;
use resource::constants::{
    database::error_code::{NO_SUCH_TRANSACTION, TRANSACTION_COMMITTED, TRANSACTION_TOO_OLD},
    session::FIRST_TXN_NUMBER,
};
use tracing::{debug, trace};

use crate::{
    client_session::ClientSessionState,
    error::SessionError,
    gateway::DatabaseGateway,
    session_id::SessionId,
    txn::{TransactionStatus, Txn},
};

struct MessageTemplate {
    prefix: &'static str,
    suffix: &'static str,
}

const NEWER_TRANSACTION_STARTED: MessageTemplate =
    MessageTemplate { prefix: "because a newer transaction ", suffix: " has already started" };
const TRANSACTION_ABORTED: MessageTemplate = MessageTemplate { prefix: "Transaction ", suffix: " has been aborted" };
const TRANSACTION_COMMITTED_MESSAGE: MessageTemplate = MessageTemplate { prefix: "Transaction ", suffix: " has been committed" };
const NO_MATCHING_TRANSACTION: MessageTemplate = MessageTemplate {
    prefix: "Given transaction number ",
    suffix: " does not match any in-progress transactions",
};

/// Newer servers say "Transaction with txnNumber 3 ..." where older ones say "Transaction 3 ...".
const TXN_NUMBER_QUALIFIER: &str = "with txnNumber";

impl MessageTemplate {
    fn transaction_number(&self, message: &str) -> Option<i64> {
        let start = message.find(self.prefix)? + self.prefix.len();
        let end = start + message[start..].find(self.suffix)?;
        message[start..end].replace(TXN_NUMBER_QUALIFIER, "").trim().parse().ok()
    }
}

/// What a failed probe reveals about the session.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ProbeErrorReading {
    /// The session has moved on to a later transaction than the one probed.
    NewerTransactionStarted { txn_id: i64 },
    /// The probed transaction is known and settled, or no transaction matches it.
    Transaction(Txn),
}

impl ProbeErrorReading {
    /// The session state the error implies: a newer transaction is assumed to be running.
    pub fn txn(&self) -> Txn {
        match *self {
            Self::NewerTransactionStarted { txn_id } => Txn::in_progress(txn_id),
            Self::Transaction(txn) => txn,
        }
    }
}

/// Reads one of the four recognised server messages. Anything else, including a recognised
/// message whose number does not fit in an i64, is not a reading.
pub fn read_probe_error(error: &DriverError) -> Option<ProbeErrorReading> {
    let code = error.server_code()?;
    let message = error.server_message()?;
    match code {
        TRANSACTION_TOO_OLD => NEWER_TRANSACTION_STARTED
            .transaction_number(message)
            .map(|txn_id| ProbeErrorReading::NewerTransactionStarted { txn_id }),
        NO_SUCH_TRANSACTION => TRANSACTION_ABORTED
            .transaction_number(message)
            .map(|txn_id| Txn::new(txn_id, TransactionStatus::Aborted))
            .or_else(|| {
                NO_MATCHING_TRANSACTION.transaction_number(message).map(|txn_id| Txn::new(txn_id, TransactionStatus::None))
            })
            .map(ProbeErrorReading::Transaction),
        TRANSACTION_COMMITTED => TRANSACTION_COMMITTED_MESSAGE
            .transaction_number(message)
            .map(|txn_id| ProbeErrorReading::Transaction(Txn::new(txn_id, TransactionStatus::Committed))),
        _ => None,
    }
}

/// Sends the probe read through `session`, letting the database validate the session and
/// transaction fields it carries.
pub async fn propagate(gateway: &DatabaseGateway, session: &mut ClientSessionState) -> Result<(), SessionError> {
    trace!("Propagating session {} at {}", session.session_id(), session.txn());
    session.execute(gateway.probe_namespace().probe()).await?;
    Ok(())
}

/// Asks the database which transaction `session_id` is on and in what state.
///
/// The first guess is transaction 1. If the database names a newer transaction, that one is probed
/// once more and whatever the second answer says is final. Errors outside the recognised set are
/// returned untouched.
pub async fn reconstruct(gateway: &DatabaseGateway, session_id: SessionId) -> Result<Txn, SessionError> {
    let options = gateway.options_pool().options_for(&session_id);
    let mut session = ClientSessionState::create(gateway, session_id, options, None);
    let guessed_txn_id = max(FIRST_TXN_NUMBER, session.transaction_number());
    session.set_server_session_transaction_number(guessed_txn_id);
    if !session.has_active_transaction() {
        session.set_message_sent_in_current_transaction(true);
        session.start_transaction()?;
    }

    let first_error = match propagate(gateway, &mut session).await {
        Ok(()) => return Ok(Txn::in_progress(guessed_txn_id)),
        Err(error) => error,
    };
    let Some(reading) = first_error.driver_error().and_then(read_probe_error) else {
        return Err(first_error);
    };
    debug!("Probe of session {} at txn {} answered with {:?}", session_id, guessed_txn_id, reading);

    match reading {
        ProbeErrorReading::NewerTransactionStarted { txn_id } if txn_id > guessed_txn_id => {
            session.set_server_session_transaction_number(txn_id);
            let second_error = match propagate(gateway, &mut session).await {
                Ok(()) => return Ok(Txn::in_progress(txn_id)),
                Err(error) => error,
            };
            match second_error.driver_error().and_then(read_probe_error) {
                Some(ProbeErrorReading::Transaction(txn)) => Ok(Txn::new(txn_id, txn.status)),
                _ => Err(second_error),
            }
        }
        ProbeErrorReading::NewerTransactionStarted { .. } => Err(first_error),
        ProbeErrorReading::Transaction(txn) => Ok(txn),
    }
}
