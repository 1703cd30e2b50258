/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::Arc;

use driver::{command, ArcDatabaseClient, Command};
use options::{TransactionOptions, WriteConcern};
use resource::constants::session::{DEFAULT_PROBE_COLLECTION, DEFAULT_PROBE_DATABASE};

use crate::options_pool::SessionOptionsPool;

/// Namespace of the cheap read used to ask the database about a session.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProbeNamespace {
    pub database: String,
    pub collection: String,
}

impl ProbeNamespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self { database: database.into(), collection: collection.into() }
    }

    pub fn probe(&self) -> Command {
        command::probe_find(&self.database, &self.collection)
    }
}

impl Default for ProbeNamespace {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_DATABASE, DEFAULT_PROBE_COLLECTION)
    }
}

/// Everything a session needs from the process: the shared database client, the options each
/// session was minted with, and the connection-level transaction defaults.
#[derive(Debug, Clone)]
pub struct DatabaseGateway {
    client: ArcDatabaseClient,
    options_pool: Arc<SessionOptionsPool>,
    transaction_defaults: TransactionOptions,
    probe_namespace: ProbeNamespace,
}

impl DatabaseGateway {
    pub fn new(
        client: ArcDatabaseClient,
        options_pool: Arc<SessionOptionsPool>,
        transaction_defaults: TransactionOptions,
        probe_namespace: ProbeNamespace,
    ) -> Self {
        // transactions always need an explicit write concern to commit with
        let transaction_defaults = TransactionOptions {
            write_concern: transaction_defaults.write_concern.or_else(|| Some(WriteConcern::majority())),
            ..transaction_defaults
        };
        Self { client, options_pool, transaction_defaults, probe_namespace }
    }

    pub fn client(&self) -> &ArcDatabaseClient {
        &self.client
    }

    pub fn options_pool(&self) -> &SessionOptionsPool {
        &self.options_pool
    }

    pub fn transaction_defaults(&self) -> &TransactionOptions {
        &self.transaction_defaults
    }

    pub fn probe_namespace(&self) -> &ProbeNamespace {
        &self.probe_namespace
    }
}
