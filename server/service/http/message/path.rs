/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    RequestPartsExt,
};
use http::request::Parts;

use crate::service::http::error::HttpServiceError;

pub(crate) const SESSION_ID_PARAM: &str = "session-id";
pub(crate) const TXN_ID_PARAM: &str = "txn-id";
pub(crate) const DATABASE_PARAM: &str = "database";
pub(crate) const COLLECTION_PARAM: &str = "collection";
pub(crate) const DOCUMENT_ID_PARAM: &str = "document-id";

async fn path_parameters(parts: &mut Parts) -> Result<HashMap<String, String>, HttpServiceError> {
    let Path(params): Path<HashMap<String, String>> =
        parts.extract::<Path<HashMap<String, String>>>().await.map_err(|err| HttpServiceError::InvalidPath { details: err.body_text() })?;
    Ok(params)
}

fn take_parameter(params: &mut HashMap<String, String>, parameter: &str) -> Result<String, HttpServiceError> {
    params.remove(parameter).ok_or_else(|| HttpServiceError::MissingPathParameter { parameter: parameter.to_owned() })
}

#[derive(Debug, Clone)]
pub(crate) struct SessionPath {
    pub(crate) session_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionPath
where
    S: Send + Sync,
{
    type Rejection = HttpServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let mut params = path_parameters(parts).await?;
        Ok(Self { session_id: take_parameter(&mut params, SESSION_ID_PARAM)? })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct TransactionPath {
    pub(crate) session_id: String,
    pub(crate) txn_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for TransactionPath
where
    S: Send + Sync,
{
    type Rejection = HttpServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let mut params = path_parameters(parts).await?;
        Ok(Self {
            session_id: take_parameter(&mut params, SESSION_ID_PARAM)?,
            txn_id: take_parameter(&mut params, TXN_ID_PARAM)?,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CollectionPath {
    pub(crate) database: String,
    pub(crate) collection: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for CollectionPath
where
    S: Send + Sync,
{
    type Rejection = HttpServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let mut params = path_parameters(parts).await?;
        Ok(Self {
            database: take_parameter(&mut params, DATABASE_PARAM)?,
            collection: take_parameter(&mut params, COLLECTION_PARAM)?,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DocumentPath {
    pub(crate) database: String,
    pub(crate) collection: String,
    pub(crate) document_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for DocumentPath
where
    S: Send + Sync,
{
    type Rejection = HttpServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let mut params = path_parameters(parts).await?;
        Ok(Self {
            database: take_parameter(&mut params, DATABASE_PARAM)?,
            collection: take_parameter(&mut params, COLLECTION_PARAM)?,
            document_id: take_parameter(&mut params, DOCUMENT_ID_PARAM)?,
        })
    }
}
