/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
use axum::response::{IntoResponse, Response};
use driver::error::DriverError;
use error::DocwayError;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use session::error::SessionError;

use crate::service::{
    http::{error::HttpServiceError, message::body::JsonBody},
    session_service::SessionServiceError,
};

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl IntoResponse for HttpServiceError {
    fn into_response(self) -> Response {
        let code = match &self {
            HttpServiceError::JsonBodyExpected { .. } => StatusCode::BAD_REQUEST,
            HttpServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            HttpServiceError::MissingPathParameter { .. } => StatusCode::NOT_FOUND,
            HttpServiceError::InvalidPath { .. } => StatusCode::BAD_REQUEST,
            HttpServiceError::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
            HttpServiceError::MissingQueryParameter { .. } => StatusCode::BAD_REQUEST,
            HttpServiceError::InvalidDocument { .. } => StatusCode::BAD_REQUEST,
            HttpServiceError::SessionService { docway_source } => match docway_source {
                SessionServiceError::SessionsUnsupported { .. } => StatusCode::BAD_GATEWAY,
                SessionServiceError::KillSessionFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                SessionServiceError::TransactionNotInProgress { .. } => StatusCode::NOT_ACCEPTABLE,
                SessionServiceError::CommitRejected { .. } => StatusCode::NOT_ACCEPTABLE,
                SessionServiceError::CommitIllegalOperation { .. } => StatusCode::BAD_GATEWAY,
                SessionServiceError::Session { docway_source } => session_error_status(docway_source),
            },
            HttpServiceError::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            HttpServiceError::Session { docway_source } => session_error_status(docway_source),
            HttpServiceError::Database { docway_source } => driver_error_status(docway_source),
        };
        (code, JsonBody(encode_error(self))).into_response()
    }
}

fn session_error_status(error: &SessionError) -> StatusCode {
    match error {
        SessionError::InvalidSessionId { .. } => StatusCode::BAD_REQUEST,
        SessionError::InvalidTransactionId { .. } => StatusCode::BAD_REQUEST,
        SessionError::IllegalState { .. } => StatusCode::NOT_ACCEPTABLE,
        SessionError::UnsupportedWriteConcern { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        SessionError::MissingWriteConcern { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        SessionError::TransactionsNotEnabled { .. } => StatusCode::BAD_REQUEST,
        SessionError::Driver { docway_source } => driver_error_status(docway_source),
    }
}

fn driver_error_status(error: &DriverError) -> StatusCode {
    match error {
        DriverError::Write { code: DUPLICATE_KEY, .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn encode_error(error: HttpServiceError) -> ErrorResponse {
    ErrorResponse { code: error.root_source_docway_error().code().to_string(), message: error.format_source_trace() }
}
