/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use options::SessionOptions;
use resource::constants::http::{SESSIONS_SEGMENT, TRANSACTIONS_SEGMENT};
use serde::{Deserialize, Serialize};
use session::{
    session_id::SessionId,
    txn::{TransactionStatus, Txn},
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateSessionPayload {
    #[serde(default)]
    pub(crate) ops: Option<SessionOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CurrentTxnResponse {
    pub(crate) current_txn: Option<TxnResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TxnResponse {
    pub(crate) id: i64,
    pub(crate) status: TransactionStatus,
}

pub(crate) fn encode_current_txn(txn: Txn) -> CurrentTxnResponse {
    let current_txn = match txn.status {
        TransactionStatus::None => None,
        status => Some(TxnResponse { id: txn.id, status }),
    };
    CurrentTxnResponse { current_txn }
}

pub(crate) fn session_location(session_id: SessionId) -> String {
    format!("/{SESSIONS_SEGMENT}/{session_id}")
}

pub(crate) fn transaction_location(session_id: &str, txn_id: i64) -> String {
    format!("/{SESSIONS_SEGMENT}/{session_id}/{TRANSACTIONS_SEGMENT}/{txn_id}")
}
