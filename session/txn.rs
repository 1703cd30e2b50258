/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use resource::constants::session::UNSUPPORTED_TXN_NUMBER;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    None,
    InProgress,
    Committed,
    Aborted,
}

impl TransactionStatus {
    /// A transaction in any of these states can be followed by a new one.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::None | Self::Committed | Self::Aborted)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "NONE",
            Self::InProgress => "IN_PROGRESS",
            Self::Committed => "COMMITTED",
            Self::Aborted => "ABORTED",
        };
        f.write_str(name)
    }
}

/// What the database believes about one session's transaction: its number and its status.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct Txn {
    pub id: i64,
    pub status: TransactionStatus,
}

impl Txn {
    pub fn new(id: i64, status: TransactionStatus) -> Self {
        Self { id, status }
    }

    pub fn in_progress(id: i64) -> Self {
        Self::new(id, TransactionStatus::InProgress)
    }

    /// Returned when the deployment cannot run transactions at all.
    pub fn unsupported() -> Self {
        Self::new(UNSUPPORTED_TXN_NUMBER, TransactionStatus::None)
    }

    /// The number the next transaction on this session must use.
    pub fn next_id(&self) -> i64 {
        match self.status {
            TransactionStatus::None => self.id,
            _ => self.id.saturating_add(1),
        }
    }
}

impl fmt::Display for Txn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txn(id={}, status={})", self.id, self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_serialize_in_upper_snake_case() {
        assert_eq!(serde_json::to_string(&TransactionStatus::InProgress).unwrap(), r#""IN_PROGRESS""#);
        assert_eq!(serde_json::to_string(&TransactionStatus::Committed).unwrap(), r#""COMMITTED""#);
        assert_eq!(TransactionStatus::Aborted.to_string(), "ABORTED");
    }

    #[test]
    fn next_id_reuses_a_number_nothing_was_started_on() {
        assert_eq!(Txn::new(1, TransactionStatus::None).next_id(), 1);
        assert_eq!(Txn::new(4, TransactionStatus::Committed).next_id(), 5);
        assert_eq!(Txn::new(4, TransactionStatus::Aborted).next_id(), 5);
    }

    #[test]
    fn unsupported_is_never_a_real_transaction_number() {
        let unsupported = Txn::unsupported();
        assert_eq!(unsupported, Txn::new(-1, TransactionStatus::None));
        assert_ne!(unsupported, Txn::new(1, TransactionStatus::None));
        assert_eq!(unsupported.to_string(), "Txn(id=-1, status=NONE)");
    }
}
