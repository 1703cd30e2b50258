/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    cell::OnceCell,
    sync::Mutex,
};

use logger::initialise_scoped_logging;
use tracing::subscriber::DefaultGuard;

pub use crate::fake_database::{FakeDatabase, FakeTopology, FakeTxnState, MessageDialect};


pub static LOGGING_GUARD: Mutex<OnceCell<DefaultGuard>> = Mutex::new(OnceCell::new());

pub fn init_logging() {
    LOGGING_GUARD.lock().unwrap().get_or_init(|| initialise_scoped_logging("debug"));
}
