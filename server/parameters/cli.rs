/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::path::PathBuf;

use clap::Parser;
use options::Acknowledgment;

/// Docway: a stateless HTTP gateway to a document database
#[derive(Parser, Debug, Default)]
#[command(version, about, long_about = None)]
pub struct CLIArgs {
    /// Path to the YAML configuration file
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Server host and port, eg., 0.0.0.0:8080
    #[arg(long = "server.address")]
    pub server_address: Option<String>,

    /// Database connection string, eg., mongodb://127.0.0.1:27017/?replicaSet=rs0
    #[arg(long = "database.uri", value_name = "URI")]
    pub database_uri: Option<String>,

    /// Write concern `w` of transaction commits: `majority` or a number of nodes
    #[arg(long = "database.write-concern")]
    pub database_write_concern: Option<Acknowledgment>,

    /// Default log level, overridden by RUST_LOG
    #[arg(long = "logging.level")]
    pub logging_level: Option<String>,
}
