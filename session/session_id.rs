/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, str::FromStr};

use driver::bson::{doc, spec::BinarySubtype, Binary, Bson, Document};
use uuid::Uuid;

use crate::error::SessionError;

pub const WIRE_IDENTIFIER_FIELD: &str = "id";

/// A logical session identifier, opaque to the database. Supplied by clients on every request.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// `{ id: <16-byte binary, UUID subtype> }`: the `lsid` attached to every command of this session.
    pub fn to_wire_identifier(&self) -> Document {
        doc! { WIRE_IDENTIFIER_FIELD: Binary { subtype: BinarySubtype::Uuid, bytes: self.0.as_bytes().to_vec() } }
    }

    pub fn from_wire_identifier(identifier: &Document) -> Option<Self> {
        match identifier.get(WIRE_IDENTIFIER_FIELD) {
            Some(Bson::Binary(Binary { subtype: BinarySubtype::Uuid, bytes })) => {
                Uuid::from_slice(bytes).ok().map(Self)
            }
            _ => None,
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value).map(Self).map_err(|_| SessionError::InvalidSessionId { value: value.to_owned() })
    }
}

/// Transaction ids travel in URLs and query strings as decimal numbers.
pub fn parse_txn_id(value: &str) -> Result<i64, SessionError> {
    value.parse::<i64>().map_err(|_| SessionError::InvalidTransactionId { value: value.to_owned() })
}
