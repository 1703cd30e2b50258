/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{io, net::SocketAddr, sync::Arc};

use driver::error::DriverError;
use error::docway_error;

use crate::parameters::ConfigError;

docway_error! {
    pub ServerOpenError(component = "Server open", prefix = "SRO") {
        Config(1, "Invalid server configuration.", ( docway_source: ConfigError )),
        DatabaseConnection(2, "Could not set up the database connection.", ( docway_source: DriverError )),
        CouldNotResolveAddress(3, "Unable to map address '{address}' to any IP addresses.", address: String),
        AddressLookup(4, "Could not resolve address '{address}'.", address: String, ( source: Arc<io::Error> )),
        HttpServe(5, "Could not serve HTTP on {address}.", address: SocketAddr, ( source: Arc<io::Error> )),
    }
}
