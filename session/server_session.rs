/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use driver::bson::Document;

use crate::session_id::SessionId;

/// The database-side half of a session as this process sees it: the wire identifier and the
/// transaction number the next transactional command will carry. Never pooled or reused.
#[derive(Debug, Clone)]
pub struct ServerSession {
    identifier: Document,
    transaction_number: i64,
    closed: bool,
}

impl ServerSession {
    pub fn new(session_id: &SessionId) -> Self {
        Self { identifier: session_id.to_wire_identifier(), transaction_number: 0, closed: false }
    }

    pub fn identifier(&self) -> &Document {
        &self.identifier
    }

    pub fn transaction_number(&self) -> i64 {
        self.transaction_number
    }

    pub fn set_transaction_number(&mut self, transaction_number: i64) {
        self.transaction_number = transaction_number;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        self.closed = true;
    }
}
