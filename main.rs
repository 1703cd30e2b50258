/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

#![deny(unused_must_use)]
#![deny(elided_lifetimes_in_paths)]

use clap::Parser;
use logger::{initialise_logging, result::ResultExt};
use server::{
    parameters::{cli::CLIArgs, config::Config},
    ServerBuilder,
};

#[tokio::main]
async fn main() {
    let cli_args = CLIArgs::parse();
    let config = Config::load(&cli_args).expect_or_log("Could not load the server configuration");
    initialise_logging(&config.logging.level);

    ServerBuilder::default()
        .build(config)
        .await
        .expect_or_log("Could not start the server")
        .serve()
        .await
        .unwrap_or_log()
}
