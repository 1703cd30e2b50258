/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

#![deny(unused_must_use)]
#![deny(elided_lifetimes_in_paths)]

pub mod client_session;
pub mod error;
pub mod factory;
pub mod gateway;
pub mod options_pool;
pub mod server_session;
pub mod session_id;
pub mod txn;
pub mod txn_probe;
