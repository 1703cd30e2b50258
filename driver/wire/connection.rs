/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::time::Duration;

use resource::constants::database::ADMIN_DATABASE;
use tokio::{net::TcpStream, sync::Mutex, time::timeout};
use tracing::{debug, trace};

use crate::{
    bson::{doc, spec::BinarySubtype, Binary, Bson, Document},
    error::DriverError,
    wire::{
        message::OpMsg,
        scram::{ScramConversation, ScramCredential, MECHANISM},
    },
};

/// Errors after which the connection no longer points at a writable primary.
const NOT_PRIMARY_CODES: [i32; 6] = [91, 189, 10107, 11600, 11602, 13435];

/// A single socket speaking `OP_MSG`. Commands are written exactly as given, with only `$db` added.
#[derive(Debug)]
pub struct WireConnection {
    address: String,
    stream: TcpStream,
    next_request_id: i32,
}

impl WireConnection {
    pub async fn connect(address: &str, connect_timeout: Duration) -> Result<Self, DriverError> {
        let stream = timeout(connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| DriverError::Connection { details: format!("timed out connecting to {address}") })?
            .map_err(|err| DriverError::Connection { details: format!("{address}: {err}") })?;
        stream.set_nodelay(true).map_err(DriverError::io)?;
        Ok(Self { address: address.to_owned(), stream, next_request_id: 1 })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sends `body` to `database` and returns the raw reply, whatever its `ok` value.
    pub async fn round_trip(&mut self, database: &str, mut body: Document) -> Result<Document, DriverError> {
        body.insert("$db", database);
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1).max(1);
        OpMsg::new(request_id, 0, &body)?.write_to(&mut self.stream).await?;
        let reply = OpMsg::read_from(&mut self.stream).await?;
        if reply.response_to != request_id {
            return Err(DriverError::Protocol {
                details: format!("reply to request {} received for request {request_id}", reply.response_to),
            });
        }
        reply.document()
    }

    pub async fn run_command(&mut self, database: &str, body: Document) -> Result<Document, DriverError> {
        command_result(self.round_trip(database, body).await?)
    }

    async fn authenticate(&mut self, credential: &ScramCredential) -> Result<(), DriverError> {
        let mut conversation = ScramConversation::new(credential.clone());
        let reply = self
            .run_command(
                &credential.source,
                doc! {
                    "saslStart": 1,
                    "mechanism": MECHANISM,
                    "payload": binary(conversation.client_first()),
                    "autoAuthorize": 1,
                    "options": { "skipEmptyExchange": true },
                },
            )
            .await?;
        let conversation_id = reply.get("conversationId").cloned().unwrap_or(Bson::Int32(1));
        let client_final = conversation.client_final(&sasl_payload(&reply, credential)?)?;
        let mut reply = self
            .run_command(
                &credential.source,
                doc! { "saslContinue": 1, "conversationId": conversation_id.clone(), "payload": binary(client_final) },
            )
            .await?;
        conversation.verify_server_final(&sasl_payload(&reply, credential)?)?;
        while !reply.get_bool("done").unwrap_or(true) {
            reply = self
                .run_command(
                    &credential.source,
                    doc! { "saslContinue": 1, "conversationId": conversation_id.clone(), "payload": binary(Vec::new()) },
                )
                .await?;
        }
        debug!("Authenticated as '{}' on {}", credential.username, self.address);
        Ok(())
    }
}

/// Idle connections to the current primary, opened on demand.
#[derive(Debug)]
pub struct WireTransport {
    seeds: Vec<String>,
    credential: Option<ScramCredential>,
    connect_timeout: Duration,
    idle: Mutex<Vec<WireConnection>>,
}

impl WireTransport {
    pub fn new(seeds: Vec<String>, credential: Option<ScramCredential>, connect_timeout: Duration) -> Self {
        Self { seeds, credential, connect_timeout, idle: Mutex::new(Vec::new()) }
    }

    pub fn seeds(&self) -> &[String] {
        &self.seeds
    }

    /// A server-side failure is returned as [`DriverError::Command`] with the server's code, code
    /// name and message untouched.
    pub async fn execute(&self, database: &str, body: Document) -> Result<Document, DriverError> {
        let idle = self.idle.lock().await.pop();
        let mut connection = match idle {
            Some(connection) => connection,
            None => self.open_primary().await?,
        };
        let reply = connection.round_trip(database, body).await?;
        let result = command_result(reply);
        match &result {
            Err(DriverError::Command { code, .. }) if NOT_PRIMARY_CODES.contains(code) => {
                debug!("Dropping connection to {} after error {code}", connection.address());
            }
            _ => self.idle.lock().await.push(connection),
        }
        result
    }

    async fn open_primary(&self) -> Result<WireConnection, DriverError> {
        let mut last_error = None;
        for seed in &self.seeds {
            match self.open_writable(seed).await {
                Ok(connection) => return Ok(connection),
                Err(err) => {
                    trace!("Cannot use {seed} as primary: {err}");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| DriverError::Connection { details: "no hosts to connect to".to_owned() }))
    }

    async fn open_writable(&self, address: &str) -> Result<WireConnection, DriverError> {
        let (mut connection, hello) = self.open_handshaken(address).await?;
        if !is_writable_primary(&hello) {
            let primary = hello
                .get_str("primary")
                .map_err(|_| DriverError::Connection { details: format!("{address} is not a writable primary") })?;
            (connection, _) = self.open_handshaken(primary).await?;
        }
        if let Some(credential) = &self.credential {
            connection.authenticate(credential).await?;
        }
        Ok(connection)
    }

    async fn open_handshaken(&self, address: &str) -> Result<(WireConnection, Document), DriverError> {
        let mut connection = WireConnection::connect(address, self.connect_timeout).await?;
        let hello = connection.run_command(ADMIN_DATABASE, doc! { "hello": 1 }).await?;
        trace!("{address} answered hello with {hello}");
        Ok((connection, hello))
    }
}

/// Replies with `ok: 0` become [`DriverError::Command`].
pub fn command_result(reply: Document) -> Result<Document, DriverError> {
    let ok = match reply.get("ok") {
        Some(Bson::Double(ok)) => *ok == 1.0,
        Some(Bson::Int32(ok)) => *ok == 1,
        Some(Bson::Int64(ok)) => *ok == 1,
        Some(Bson::Boolean(ok)) => *ok,
        _ => false,
    };
    if ok {
        return Ok(reply);
    }
    let code = match reply.get("code") {
        Some(Bson::Int32(code)) => *code,
        Some(Bson::Int64(code)) => *code as i32,
        Some(Bson::Double(code)) => *code as i32,
        _ => 0,
    };
    Err(DriverError::Command {
        code,
        code_name: reply.get_str("codeName").unwrap_or_default().to_owned(),
        message: reply.get_str("errmsg").unwrap_or_default().to_owned(),
    })
}

fn is_writable_primary(hello: &Document) -> bool {
    hello.get_bool("isWritablePrimary").or_else(|_| hello.get_bool("ismaster")).unwrap_or(false)
}

fn binary(bytes: Vec<u8>) -> Binary {
    Binary { subtype: BinarySubtype::Generic, bytes }
}

fn sasl_payload(reply: &Document, credential: &ScramCredential) -> Result<Vec<u8>, DriverError> {
    match reply.get("payload") {
        Some(Bson::Binary(binary)) => Ok(binary.bytes.clone()),
        _ => Err(DriverError::Authentication {
            username: credential.username.clone(),
            details: "reply carries no SASL payload".to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_replies_keep_the_server_error() {
        let reply = doc! { "ok": 0.0, "errmsg": "Transaction 4 has been aborted.", "code": 251, "codeName": "NoSuchTransaction" };
        assert_eq!(
            command_result(reply).unwrap_err(),
            DriverError::command(251, "NoSuchTransaction", "Transaction 4 has been aborted.")
        );
        assert!(command_result(doc! { "ok": 1 }).is_ok());
        assert!(command_result(doc! { "n": 1 }).is_err());
    }

    #[test]
    fn primaries_are_recognised_by_either_hello_dialect() {
        assert!(is_writable_primary(&doc! { "isWritablePrimary": true }));
        assert!(is_writable_primary(&doc! { "ismaster": true }));
        assert!(!is_writable_primary(&doc! { "isWritablePrimary": false, "secondary": true }));
    }
}
