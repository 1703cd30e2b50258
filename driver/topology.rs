/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use resource::constants::database::error_code::UNAUTHORIZED;
use tracing::{debug, warn};

use crate::{command, error::DriverError, DatabaseClient};

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Topology {
    ReplicaSet { set_name: Option<String> },
    Standalone,
}

impl Topology {
    /// Multi-document transactions need a replica set; a standalone node rejects them.
    pub fn supports_transactions(&self) -> bool {
        matches!(self, Topology::ReplicaSet { .. })
    }
}

pub async fn check_liveness(client: &dyn DatabaseClient) -> Result<(), DriverError> {
    client.execute(command::ping()).await.map(|_| ())
}

pub async fn server_version(client: &dyn DatabaseClient) -> Result<String, DriverError> {
    let reply = client.execute(command::build_info()).await?;
    match reply.get_str("version") {
        Ok(version) => Ok(version.to_owned()),
        Err(_) => {
            warn!("Cannot get the database version.");
            Ok("?".to_owned())
        }
    }
}

/// `replSetGetStatus` only succeeds on replica set members. A refusal from the server means
/// standalone (or unknown, treated alike); failing to reach the server at all is an error.
pub async fn detect_topology(client: &dyn DatabaseClient) -> Result<Topology, DriverError> {
    match client.execute(command::repl_set_get_status()).await {
        Ok(reply) => Ok(Topology::ReplicaSet { set_name: reply.get_str("set").ok().map(str::to_owned) }),
        Err(DriverError::Command { code, .. }) if code == UNAUTHORIZED => {
            warn!(
                "Unable to check if the database is configured as a replica set: the user cannot execute \
                the replSetGetStatus command. Tip: grant the user the built-in role 'clusterMonitor'."
            );
            Ok(Topology::Standalone)
        }
        Err(DriverError::Command { code, code_name, .. }) => {
            debug!("replSetGetStatus refused with {code} ({code_name}), assuming a standalone deployment");
            Ok(Topology::Standalone)
        }
        Err(err) => Err(err),
    }
}
