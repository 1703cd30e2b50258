/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

#![deny(unused_must_use)]
#![deny(elided_lifetimes_in_paths)]

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
pub use mongodb::bson;
use options::ReadPreference;

use crate::{bson::Document, error::DriverError};

pub mod command;
pub mod error;
pub mod mongo;
pub mod topology;
pub mod wire;

/// A fully built database command: the target database, the command document and where to route it.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub database: String,
    pub body: Document,
    pub read_preference: ReadPreference,
}

impl Command {
    pub fn new(database: impl Into<String>, body: Document) -> Self {
        Self { database: database.into(), body, read_preference: ReadPreference::Primary }
    }

    pub fn with_read_preference(mut self, read_preference: ReadPreference) -> Self {
        self.read_preference = read_preference;
        self
    }

    /// The command name is the first key of the command document.
    pub fn name(&self) -> &str {
        self.body.keys().next().map(|key| key.as_str()).unwrap_or("")
    }
}

/// The single seam between the gateway and the database.
///
/// Commands arrive already tagged with any session and transaction fields, so implementations
/// only transport them and translate server failures into [`DriverError`] without rewriting
/// the server's code or message.
#[async_trait]
pub trait DatabaseClient: Debug + Send + Sync {
    async fn execute(&self, command: Command) -> Result<Document, DriverError>;
}

pub type ArcDatabaseClient = Arc<dyn DatabaseClient>;
