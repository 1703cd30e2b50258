/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{io, sync::Arc};

use error::docway_error;

docway_error! {
    pub DriverError(component = "Database driver", prefix = "DRV") {
        Command(1, "Command failed with error {code} ({code_name}): '{message}'.", code: i32, code_name: String, message: String),
        Connection(2, "Could not reach the database: {details}", details: String),
        InvalidConnectionString(3, "Invalid database connection string '{uri}'.", uri: String, ( source: Arc<mongodb::error::Error> )),
        MalformedReply(4, "Malformed reply to '{command}': {details}", command: String, details: String),
        Write(5, "Write failed with error {code}: '{message}'.", code: i32, message: String),
        Protocol(6, "Unexpected wire message: {details}", details: String),
        Authentication(7, "Could not authenticate as '{username}': {details}", username: String, details: String),
        UnsupportedConnectionOption(8, "The connection string option '{option}' is not supported.", option: String),
        Io(9, "I/O failure on the database connection.", ( source: Arc<io::Error> )),
        InvalidWriteConcern(10, "Write concern {field}: {value} is out of range.", field: &'static str, value: u64),
    }
}

impl DriverError {
    pub fn io(source: io::Error) -> Self {
        Self::Io { source: Arc::new(source) }
    }

    pub fn command(code: i32, code_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command { code, code_name: code_name.into(), message: message.into() }
    }

    /// The server's numeric error code, if the server answered at all.
    pub fn server_code(&self) -> Option<i32> {
        match self {
            Self::Command { code, .. } | Self::Write { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Command { message, .. } | Self::Write { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn code_name(&self) -> Option<&str> {
        match self {
            Self::Command { code_name, .. } => Some(code_name),
            _ => None,
        }
    }
}

impl PartialEq for DriverError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Command { code, code_name, message },
                Self::Command { code: other_code, code_name: other_code_name, message: other_message },
            ) => code == other_code && code_name == other_code_name && message == other_message,
            (Self::Connection { details }, Self::Connection { details: other_details }) => details == other_details,
            (
                Self::InvalidConnectionString { uri, .. },
                Self::InvalidConnectionString { uri: other_uri, .. },
            ) => uri == other_uri,
            (
                Self::MalformedReply { command, details },
                Self::MalformedReply { command: other_command, details: other_details },
            ) => command == other_command && details == other_details,
            (Self::Write { code, message }, Self::Write { code: other_code, message: other_message }) => {
                code == other_code && message == other_message
            }
            (Self::Protocol { details }, Self::Protocol { details: other_details }) => details == other_details,
            (
                Self::Authentication { username, details },
                Self::Authentication { username: other_username, details: other_details },
            ) => username == other_username && details == other_details,
            (
                Self::UnsupportedConnectionOption { option },
                Self::UnsupportedConnectionOption { option: other_option },
            ) => option == other_option,
            (
                Self::InvalidWriteConcern { field, value },
                Self::InvalidWriteConcern { field: other_field, value: other_value },
            ) => field == other_field && value == other_value,
            _ => false,
        }
    }
}
