/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{collections::HashMap, sync::Arc};

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    RequestPartsExt,
};
use driver::bson::{oid::ObjectId, Bson, Document};
use http::request::Parts;
use resource::constants::http::{SESSION_ID_QUERY_PARAM, TRANSACTION_ID_QUERY_PARAM};
use session::client_session::ClientSessionState;

use crate::service::http::{docway_service::HTTPDocwayService, error::HttpServiceError};

/// The session named by the `sid` and `txn` query parameters, if the request names one.
#[derive(Debug)]
pub(crate) struct RequestSession(pub Option<ClientSessionState>);

#[async_trait]
impl FromRequestParts<Arc<HTTPDocwayService>> for RequestSession {
    type Rejection = HttpServiceError;

    async fn from_request_parts(parts: &mut Parts, service: &Arc<HTTPDocwayService>) -> Result<Self, Self::Rejection> {
        let Query(params): Query<HashMap<String, String>> =
            parts.extract::<Query<HashMap<String, String>>>().await.map_err(|err| HttpServiceError::InvalidQuery { details: err.body_text() })?;
        let txn_id = params.get(TRANSACTION_ID_QUERY_PARAM).map(String::as_str);
        let Some(session_id) = params.get(SESSION_ID_QUERY_PARAM) else {
            return match txn_id {
                Some(_) => Err(HttpServiceError::MissingQueryParameter { parameter: SESSION_ID_QUERY_PARAM.to_owned() }),
                None => Ok(Self(None)),
            };
        };
        service
            .session_factory()
            .client_session(session_id, txn_id)
            .map(|session| Self(Some(session)))
            .map_err(|docway_source| HttpServiceError::Session { docway_source })
    }
}

/// Ids that look like ObjectIds are read as ObjectIds, anything else as a string.
pub(crate) fn parse_document_id(raw: &str) -> Bson {
    match ObjectId::parse_str(raw) {
        Ok(object_id) => Bson::ObjectId(object_id),
        Err(_) => Bson::String(raw.to_owned()),
    }
}

pub(crate) fn format_document_id(id: &Bson) -> String {
    match id {
        Bson::ObjectId(object_id) => object_id.to_hex(),
        Bson::String(value) => value.clone(),
        other => other.to_string(),
    }
}

/// Reads a JSON object, in extended JSON where types need it, as a document to insert. An `_id`
/// is generated when absent.
pub(crate) fn decode_document(body: serde_json::Value) -> Result<(Bson, Document), HttpServiceError> {
    let mut document = match Bson::try_from(body) {
        Ok(Bson::Document(document)) => document,
        Ok(other) => {
            return Err(HttpServiceError::InvalidDocument { details: format!("expected a JSON object, found {other}") })
        }
        Err(err) => return Err(HttpServiceError::InvalidDocument { details: err.to_string() }),
    };
    let id = match document.get("_id") {
        Some(id) => id.clone(),
        None => {
            let id = Bson::ObjectId(ObjectId::new());
            document.insert("_id", id.clone());
            id
        }
    };
    Ok((id, document))
}

pub(crate) fn encode_document(document: Document) -> serde_json::Value {
    Bson::Document(document).into_relaxed_extjson()
}

#[cfg(test)]
mod tests {
    use driver::bson::doc;

    use super::*;

    #[test]
    fn object_id_shaped_ids_are_object_ids() {
        let object_id = ObjectId::new();
        assert_eq!(parse_document_id(&object_id.to_hex()), Bson::ObjectId(object_id));
        assert_eq!(parse_document_id("alice"), Bson::String("alice".to_owned()));
        assert_eq!(format_document_id(&Bson::ObjectId(object_id)), object_id.to_hex());
    }

    #[test]
    fn missing_ids_are_generated() {
        let (id, document) = decode_document(serde_json::json!({ "name": "x" })).unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));
        assert_eq!(document.get("_id"), Some(&id));

        let (id, _) = decode_document(serde_json::json!({ "_id": "given" })).unwrap();
        assert_eq!(id, Bson::String("given".to_owned()));
    }

    #[test]
    fn only_objects_are_documents() {
        assert!(matches!(decode_document(serde_json::json!([1, 2])), Err(HttpServiceError::InvalidDocument { .. })));
    }

    #[test]
    fn documents_render_as_relaxed_extended_json() {
        let json = encode_document(doc! { "_id": "a", "n": 1_i64 });
        assert_eq!(json, serde_json::json!({ "_id": "a", "n": 1 }));
    }
}
