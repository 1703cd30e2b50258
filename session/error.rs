/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use driver::error::DriverError;
use error::docway_error;

docway_error! {
    pub SessionError(component = "Client session", prefix = "SES") {
        InvalidSessionId(1, "Invalid session id '{value}'.", value: String),
        InvalidTransactionId(2, "Invalid txn '{value}'.", value: String),
        IllegalState(3, "{description}", description: &'static str),
        UnsupportedWriteConcern(4, "Transactions do not support unacknowledged write concern."),
        MissingWriteConcern(5, "Invariant violated: transaction options write concern can not be empty."),
        TransactionsNotEnabled(6, "Transactions are not enabled: a transaction id was supplied but the deployment does not support transactions."),
        Driver(7, "Database operation failed.", ( docway_source: DriverError )),
    }
}

impl SessionError {
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::Driver { docway_source } => Some(docway_source),
            _ => None,
        }
    }
}

impl From<DriverError> for SessionError {
    fn from(docway_source: DriverError) -> Self {
        Self::Driver { docway_source }
    }
}
