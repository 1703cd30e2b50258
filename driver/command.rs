/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Builders for the handful of command documents the gateway sends.
//! Session and transaction fields are attached later by the session that issues the command.

use options::{Acknowledgment, ReadConcern, WriteConcern};
use resource::constants::database::ADMIN_DATABASE;

use crate::{
    bson::{doc, Bson, Document},
    error::DriverError,
    Command,
};

pub const FIND: &str = "find";
pub const INSERT: &str = "insert";
pub const COMMIT_TRANSACTION: &str = "commitTransaction";
pub const ABORT_TRANSACTION: &str = "abortTransaction";
pub const END_SESSIONS: &str = "endSessions";
pub const PING: &str = "ping";
pub const BUILD_INFO: &str = "buildInfo";
pub const REPL_SET_GET_STATUS: &str = "replSetGetStatus";

/// Session and transaction fields a session attaches to outgoing commands.
pub mod field {
    pub const LSID: &str = "lsid";
    pub const TXN_NUMBER: &str = "txnNumber";
    pub const START_TRANSACTION: &str = "startTransaction";
    pub const AUTOCOMMIT: &str = "autocommit";
    pub const READ_CONCERN: &str = "readConcern";
    pub const AFTER_CLUSTER_TIME: &str = "afterClusterTime";
    pub const OPERATION_TIME: &str = "operationTime";
}

/// A single-document read projecting only `_id`: the cheapest operation the server will validate
/// session and transaction fields against.
pub fn probe_find(database: &str, collection: &str) -> Command {
    Command::new(
        database,
        doc! {
            FIND: collection,
            "filter": {},
            "projection": { "_id": 1 },
            "limit": 1_i64,
            "singleBatch": true,
        },
    )
}

pub fn find_by_id(database: &str, collection: &str, id: Bson) -> Command {
    Command::new(
        database,
        doc! {
            FIND: collection,
            "filter": { "_id": id },
            "limit": 1_i64,
            "singleBatch": true,
        },
    )
}

pub fn insert_one(database: &str, collection: &str, document: Document) -> Command {
    Command::new(database, doc! { INSERT: collection, "documents": [document] })
}

pub fn commit_transaction(write_concern: &WriteConcern) -> Result<Command, DriverError> {
    let write_concern = write_concern_document(write_concern)?;
    Ok(Command::new(ADMIN_DATABASE, doc! { COMMIT_TRANSACTION: 1_i32, "writeConcern": write_concern }))
}

pub fn abort_transaction(write_concern: &WriteConcern) -> Result<Command, DriverError> {
    let write_concern = write_concern_document(write_concern)?;
    Ok(Command::new(ADMIN_DATABASE, doc! { ABORT_TRANSACTION: 1_i32, "writeConcern": write_concern }))
}

/// `{ endSessions: [ { id: <binary> }, ... ] }`
pub fn end_sessions(identifiers: Vec<Document>) -> Command {
    let identifiers: Vec<Bson> = identifiers.into_iter().map(Bson::Document).collect();
    Command::new(ADMIN_DATABASE, doc! { END_SESSIONS: identifiers })
}

pub fn ping() -> Command {
    Command::new(ADMIN_DATABASE, doc! { PING: 1_i32 })
}

pub fn build_info() -> Command {
    Command::new(ADMIN_DATABASE, doc! { BUILD_INFO: 1_i32 })
}

pub fn repl_set_get_status() -> Command {
    Command::new(ADMIN_DATABASE, doc! { REPL_SET_GET_STATUS: 1_i32 })
}

/// The server reads `w` as a 32-bit and `wtimeout` as a 64-bit signed integer.
pub fn write_concern_document(write_concern: &WriteConcern) -> Result<Document, DriverError> {
    let mut document = Document::new();
    match &write_concern.w {
        Some(Acknowledgment::Nodes(nodes)) => {
            let nodes = i32::try_from(*nodes)
                .map_err(|_| DriverError::InvalidWriteConcern { field: "w", value: u64::from(*nodes) })?;
            document.insert("w", Bson::Int32(nodes));
        }
        Some(Acknowledgment::Named(name)) => {
            document.insert("w", name.as_str());
        }
        None => {}
    }
    if let Some(journal) = write_concern.journal {
        document.insert("j", journal);
    }
    if let Some(wtimeout_millis) = write_concern.wtimeout_millis {
        let wtimeout = i64::try_from(wtimeout_millis)
            .map_err(|_| DriverError::InvalidWriteConcern { field: "wtimeout", value: wtimeout_millis })?;
        document.insert("wtimeout", Bson::Int64(wtimeout));
    }
    Ok(document)
}

pub fn read_concern_document(read_concern: &ReadConcern) -> Document {
    doc! { "level": read_concern.level.as_str() }
}

/// The first batch of a `find` reply.
pub fn first_batch(command_name: &str, reply: &Document) -> Result<Vec<Document>, DriverError> {
    let batch = reply
        .get_document("cursor")
        .and_then(|cursor| cursor.get_array("firstBatch"))
        .map_err(|err| DriverError::MalformedReply { command: command_name.to_owned(), details: err.to_string() })?;
    batch
        .iter()
        .map(|entry| match entry {
            Bson::Document(document) => Ok(document.clone()),
            other => Err(DriverError::MalformedReply {
                command: command_name.to_owned(),
                details: format!("expected a document in the batch, found {other}"),
            }),
        })
        .collect()
}

/// Write commands report per-document failures inside an `ok: 1` reply.
pub fn check_write_errors(reply: &Document) -> Result<(), DriverError> {
    let Ok(write_errors) = reply.get_array("writeErrors") else {
        return Ok(());
    };
    match write_errors.first() {
        Some(Bson::Document(write_error)) => Err(DriverError::Write {
            code: write_error.get_i32("code").unwrap_or_default(),
            message: write_error.get_str("errmsg").unwrap_or_default().to_owned(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use options::WriteConcern;

    use super::*;

    #[test]
    fn probe_is_a_single_document_id_projection() {
        let command = probe_find("foo", "bar");
        assert_eq!(command.database, "foo");
        assert_eq!(command.name(), FIND);
        assert_eq!(command.body.get_document("projection").unwrap(), &doc! { "_id": 1 });
        assert_eq!(command.body.get_i64("limit").unwrap(), 1);
    }

    #[test]
    fn write_concern_is_rendered_in_wire_form() {
        assert_eq!(write_concern_document(&WriteConcern::majority()).unwrap(), doc! { "w": "majority" });
        let concern = WriteConcern { journal: Some(true), wtimeout_millis: Some(500), ..WriteConcern::nodes(2) };
        assert_eq!(write_concern_document(&concern).unwrap(), doc! { "w": 2, "j": true, "wtimeout": 500_i64 });
    }

    #[test]
    fn node_counts_beyond_i32_are_refused() {
        let largest = WriteConcern::nodes(i32::MAX as u32);
        assert_eq!(write_concern_document(&largest).unwrap(), doc! { "w": i32::MAX });
        let too_many = WriteConcern::nodes(i32::MAX as u32 + 1);
        assert_eq!(
            commit_transaction(&too_many).unwrap_err(),
            DriverError::InvalidWriteConcern { field: "w", value: i32::MAX as u64 + 1 }
        );
        let endless = WriteConcern { wtimeout_millis: Some(u64::MAX), ..WriteConcern::majority() };
        assert!(matches!(abort_transaction(&endless), Err(DriverError::InvalidWriteConcern { field: "wtimeout", .. })));
    }

    #[test]
    fn end_sessions_wraps_every_identifier() {
        let command = end_sessions(vec![doc! { "id": 1 }, doc! { "id": 2 }]);
        assert_eq!(command.database, ADMIN_DATABASE);
        assert_eq!(command.body.get_array(END_SESSIONS).unwrap().len(), 2);
    }

    #[test]
    fn write_errors_surface_as_driver_errors() {
        let reply = doc! { "ok": 1, "n": 0, "writeErrors": [{ "index": 0, "code": 11000, "errmsg": "dup key" }] };
        let error = check_write_errors(&reply).unwrap_err();
        assert_eq!(error.server_code(), Some(11000));
        assert!(check_write_errors(&doc! { "ok": 1, "n": 1 }).is_ok());
    }

    #[test]
    fn first_batch_requires_a_cursor() {
        let reply = doc! { "cursor": { "firstBatch": [{ "_id": 1 }], "id": 0_i64 }, "ok": 1 };
        assert_eq!(first_batch(FIND, &reply).unwrap(), vec![doc! { "_id": 1 }]);
        assert!(first_batch(FIND, &doc! { "ok": 1 }).is_err());
    }
}
