/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{io, sync::Arc};

use error::docway_error;

pub mod cli;
pub mod config;

docway_error! {
    pub ConfigError(component = "Configuration", prefix = "CFG") {
        ErrorReadingConfigFile(1, "Could not read configuration file '{path}'.", path: String, ( source: Arc<io::Error> )),
        ErrorParsingYaml(2, "Could not parse configuration file '{path}'.", path: String, ( source: Arc<serde_yaml::Error> )),
        ValidationError(3, "Invalid configuration: {message}", message: String),
    }
}
