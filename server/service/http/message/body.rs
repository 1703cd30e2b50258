/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::service::http::error::HttpServiceError;

pub(crate) struct JsonBody<T>(pub T);

impl<T> From<Json<T>> for JsonBody<T> {
    fn from(Json(value): Json<T>) -> Self {
        Self(value)
    }
}

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = HttpServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::from_request(req, state)
            .await
            .map(|json: Json<T>| json.into())
            .map_err(|err| Self::Rejection::JsonBodyExpected { details: err.body_text() })
    }
}

impl<T: Serialize> IntoResponse for JsonBody<T> {
    fn into_response(self) -> Response {
        Json(self.0).into_response()
    }
}

/// A JSON body that may be left out entirely, in which case `T::default()` stands in.
pub(crate) struct OptionalJsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJsonBody<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = HttpServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|err| Self::Rejection::JsonBodyExpected { details: err.body_text() })?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }
        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|err| Self::Rejection::JsonBodyExpected { details: err.to_string() })
    }
}
