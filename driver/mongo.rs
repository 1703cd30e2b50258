/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use mongodb::options::{AuthMechanism, ClientOptions, Tls};
use options::ReadPreference;
use resource::constants::database::{ADMIN_DATABASE, DEFAULT_CONNECT_TIMEOUT_MILLIS};
use tracing::{debug, trace};

use crate::{
    bson::{doc, Document},
    error::DriverError,
    wire::{connection::WireTransport, scram::ScramCredential},
    Command, DatabaseClient,
};

/// [`DatabaseClient`] for a MongoDB deployment, shared by every request.
///
/// Only the connection string is read with the `mongodb` crate. Commands are written to the
/// primary exactly as built, over [`WireTransport`], so no implicit session is ever attached.
#[derive(Debug)]
pub struct MongoDatabaseClient {
    transport: WireTransport,
}

impl MongoDatabaseClient {
    pub async fn connect(uri: &str) -> Result<Self, DriverError> {
        let options = ClientOptions::parse(uri).await.map_err(|source| DriverError::InvalidConnectionString {
            uri: uri.to_owned(),
            source: Arc::new(source),
        })?;
        Self::from_options(options)
    }

    fn from_options(options: ClientOptions) -> Result<Self, DriverError> {
        if matches!(options.tls, Some(Tls::Enabled(_))) {
            return Err(DriverError::UnsupportedConnectionOption { option: "tls".to_owned() });
        }
        let credential = match options.credential {
            Some(credential) => {
                match &credential.mechanism {
                    None | Some(AuthMechanism::ScramSha256) => (),
                    Some(mechanism) => {
                        return Err(DriverError::UnsupportedConnectionOption {
                            option: format!("authMechanism={}", mechanism.as_str()),
                        })
                    }
                }
                let username = credential
                    .username
                    .ok_or_else(|| DriverError::UnsupportedConnectionOption { option: "credential without a username".to_owned() })?;
                Some(ScramCredential {
                    username,
                    password: credential.password.unwrap_or_default(),
                    source: credential.source.unwrap_or_else(|| ADMIN_DATABASE.to_owned()),
                })
            }
            None => None,
        };
        let seeds = options.hosts.iter().map(ToString::to_string).collect();
        let connect_timeout = options.connect_timeout.unwrap_or(Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MILLIS));
        let transport = WireTransport::new(seeds, credential, connect_timeout);
        debug!("Commands go to the primary among {:?}", transport.seeds());
        Ok(Self { transport })
    }

    /// The document exactly as it goes on the wire, minus `$db`.
    fn wire_body(command: Command) -> Document {
        let mut body = command.body;
        if command.read_preference != ReadPreference::Primary {
            body.insert("$readPreference", doc! { "mode": command.read_preference.mode() });
        }
        body
    }
}

#[async_trait]
impl DatabaseClient for MongoDatabaseClient {
    async fn execute(&self, command: Command) -> Result<Document, DriverError> {
        trace!("Sending '{}' to database '{}'", command.name(), command.database);
        let database = command.database.clone();
        self.transport.execute(&database, Self::wire_body(command)).await
    }
}
