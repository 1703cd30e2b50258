/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use driver::error::DriverError;
use error::{docway_error, DocwayError};
use session::error::SessionError;

use crate::service::session_service::SessionServiceError;

docway_error!(
    pub HttpServiceError(component = "HTTP Service", prefix = "HSR") {
        JsonBodyExpected(1, "Cannot parse expected JSON body: {details}", details: String),
        NotFound(2, "Requested resource not found."),
        MissingPathParameter(3, "Requested resource not found: missing path parameter {parameter}.", parameter: String),
        InvalidPath(4, "Invalid request path: {details}", details: String),
        InvalidQuery(5, "Invalid query parameters: {details}", details: String),
        MissingQueryParameter(6, "Missing query parameter '{parameter}'.", parameter: String),
        InvalidDocument(7, "Invalid document: {details}", details: String),
        SessionService(8, "Session service error.", ( docway_source: SessionServiceError )),
        NotAcceptable(9, "Request not acceptable.", ( docway_source: SessionServiceError )),
        Session(10, "Could not resolve the request session.", ( docway_source: SessionError )),
        Database(11, "Database operation failed.", ( docway_source: DriverError )),
    }
);

impl HttpServiceError {
    pub(crate) fn format_source_trace(&self) -> String {
        self.stack_trace().join("\n")
    }

    /// Commit and abort answer 406 for identifiers that cannot name a transaction.
    pub(crate) fn transaction_request(docway_source: SessionServiceError) -> Self {
        if docway_source.is_invalid_identifier() {
            Self::NotAcceptable { docway_source }
        } else {
            Self::SessionService { docway_source }
        }
    }
}

impl From<SessionServiceError> for HttpServiceError {
    fn from(docway_source: SessionServiceError) -> Self {
        Self::SessionService { docway_source }
    }
}

impl From<DriverError> for HttpServiceError {
    fn from(docway_source: DriverError) -> Self {
        Self::Database { docway_source }
    }
}
