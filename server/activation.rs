/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::Arc;

use driver::{
    topology::{check_liveness, detect_topology, server_version, Topology},
    ArcDatabaseClient,
};
use session::{
    factory::{ClientSessionFactory, PlainClientSessionFactory, TxnClientSessionFactory},
    gateway::DatabaseGateway,
};
use tracing::{info, warn};

/// What the backing deployment turned out to support when the server started.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Capabilities {
    pub topology: Option<Topology>,
    pub server_version: Option<String>,
    pub transactions_enabled: bool,
}

impl Capabilities {
    pub fn session_factory(&self, gateway: DatabaseGateway) -> Arc<dyn ClientSessionFactory> {
        if self.transactions_enabled {
            Arc::new(TxnClientSessionFactory::new(gateway))
        } else {
            Arc::new(PlainClientSessionFactory::new(gateway))
        }
    }
}

/// Transactions are enabled only for a reachable replica set. Any failure here leaves them
/// disabled; the rest of the gateway still starts.
pub async fn activate(client: &ArcDatabaseClient) -> Capabilities {
    if let Err(err) = check_liveness(client.as_ref()).await {
        warn!("Transactions not activated: the database is not reachable. {err}");
        return Capabilities::default();
    }

    let server_version = match server_version(client.as_ref()).await {
        Ok(version) => {
            info!("Connected to database version {version}");
            Some(version)
        }
        Err(err) => {
            warn!("Cannot get the database version. {err}");
            None
        }
    };

    let topology = match detect_topology(client.as_ref()).await {
        Ok(topology) => topology,
        Err(err) => {
            warn!("Transactions not activated: cannot determine the database topology. {err}");
            return Capabilities { topology: None, server_version, transactions_enabled: false };
        }
    };

    let transactions_enabled = topology.supports_transactions();
    match &topology {
        Topology::ReplicaSet { set_name } => {
            info!("Database is a replica set ({}), transactions activated", set_name.as_deref().unwrap_or("unnamed"))
        }
        Topology::Standalone => warn!("Transactions not activated: the database is not a replica set."),
    }
    Capabilities { topology: Some(topology), server_version, transactions_enabled }
}
