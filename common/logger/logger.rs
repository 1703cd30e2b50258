/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use tracing::subscriber::DefaultGuard;
pub use tracing::{debug, error, info, trace, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

pub mod result;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Installs the process-wide subscriber. `RUST_LOG` takes precedence over `default_level`.
pub fn initialise_logging(default_level: &str) {
    let subscriber = tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).with(env_filter(default_level));
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set up logging subscriber.");
}

/// Scoped subscriber for tests: several tests in one binary may each install it.
pub fn initialise_scoped_logging(default_level: &str) -> DefaultGuard {
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .with(env_filter(default_level));
    tracing::subscriber::set_default(subscriber)
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}
