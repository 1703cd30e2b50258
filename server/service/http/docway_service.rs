/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::sync::Arc;

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Router,
};
use driver::{bson::Document, command, error::DriverError, Command};
use http::{header::LOCATION, StatusCode};
use session::{client_session::ClientSessionState, factory::ClientSessionFactory, session_id::parse_txn_id};
use tower_http::cors::CorsLayer;
use tracing::trace;

use crate::service::{
    http::{
        error::HttpServiceError,
        message::{
            body::{JsonBody, OptionalJsonBody},
            document::{decode_document, encode_document, format_document_id, parse_document_id, RequestSession},
            path::{CollectionPath, DocumentPath, SessionPath, TransactionPath},
            session::{encode_current_txn, session_location, transaction_location, CreateSessionPayload},
        },
    },
    session_service::{SessionService, TransactionAdvance},
};

#[derive(Debug, Clone)]
pub(crate) struct HTTPDocwayService {
    session_service: SessionService,
    session_factory: Arc<dyn ClientSessionFactory>,
}

impl HTTPDocwayService {
    pub(crate) fn new(session_service: SessionService, session_factory: Arc<dyn ClientSessionFactory>) -> Self {
        Self { session_service, session_factory }
    }

    pub(crate) fn session_factory(&self) -> &dyn ClientSessionFactory {
        self.session_factory.as_ref()
    }

    /// Transaction routes exist only once transactions have been activated.
    pub(crate) fn create_router<T>(service: Arc<HTTPDocwayService>) -> Router<T> {
        let router = Router::new()
            .route("/health", get(Self::health))
            .route("/_sessions", post(Self::sessions_create))
            .route("/_sessions/:session-id", delete(Self::sessions_delete))
            .route("/:database/:collection", post(Self::documents_insert))
            .route("/:database/:collection/:document-id", get(Self::documents_get));
        let router = if service.session_factory.supports_transactions() {
            router
                .route("/_sessions/:session-id/_txns", post(Self::transactions_create))
                .route("/_sessions/:session-id/_txns/:txn-id", get(Self::transactions_get))
                .route("/_sessions/:session-id/_txns/:txn-id", patch(Self::transactions_commit))
                .route("/_sessions/:session-id/_txns/:txn-id", delete(Self::transactions_abort))
        } else {
            router
        };
        router.with_state(service)
    }

    pub(crate) fn create_cors_layer() -> CorsLayer {
        CorsLayer::permissive()
    }

    async fn health() -> impl IntoResponse {
        StatusCode::NO_CONTENT
    }

    async fn sessions_create(
        State(service): State<Arc<HTTPDocwayService>>,
        OptionalJsonBody(payload): OptionalJsonBody<CreateSessionPayload>,
    ) -> Result<Response, HttpServiceError> {
        let options = payload.ops.unwrap_or_default();
        let session_id = service.session_service.create_session(options).await?;
        Ok((StatusCode::CREATED, [(LOCATION, session_location(session_id))]).into_response())
    }

    async fn sessions_delete(
        State(service): State<Arc<HTTPDocwayService>>,
        session_path: SessionPath,
    ) -> Result<StatusCode, HttpServiceError> {
        service.session_service.kill_session(&session_path.session_id).await?;
        Ok(StatusCode::OK)
    }

    async fn transactions_create(
        State(service): State<Arc<HTTPDocwayService>>,
        session_path: SessionPath,
    ) -> Result<Response, HttpServiceError> {
        match service.session_service.advance_transaction(&session_path.session_id).await? {
            TransactionAdvance::Started(txn) => {
                let location = transaction_location(&session_path.session_id, txn.id);
                Ok((StatusCode::CREATED, [(LOCATION, location)]).into_response())
            }
            TransactionAdvance::Unchanged(_) => Ok(StatusCode::NOT_MODIFIED.into_response()),
        }
    }

    async fn transactions_get(
        State(service): State<Arc<HTTPDocwayService>>,
        transaction_path: TransactionPath,
    ) -> Result<Response, HttpServiceError> {
        parse_txn_id(&transaction_path.txn_id).map_err(|err| HttpServiceError::SessionService { docway_source: err.into() })?;
        let txn = service.session_service.current_transaction(&transaction_path.session_id).await?;
        Ok(JsonBody(encode_current_txn(txn)).into_response())
    }

    async fn transactions_commit(
        State(service): State<Arc<HTTPDocwayService>>,
        transaction_path: TransactionPath,
    ) -> Result<StatusCode, HttpServiceError> {
        service
            .session_service
            .commit_transaction(&transaction_path.session_id, &transaction_path.txn_id)
            .await
            .map_err(HttpServiceError::transaction_request)?;
        Ok(StatusCode::OK)
    }

    async fn transactions_abort(
        State(service): State<Arc<HTTPDocwayService>>,
        transaction_path: TransactionPath,
    ) -> Result<StatusCode, HttpServiceError> {
        service
            .session_service
            .abort_transaction(&transaction_path.session_id, &transaction_path.txn_id)
            .await
            .map_err(HttpServiceError::transaction_request)?;
        Ok(StatusCode::NO_CONTENT)
    }

    async fn documents_get(
        State(service): State<Arc<HTTPDocwayService>>,
        document_path: DocumentPath,
        RequestSession(session): RequestSession,
    ) -> Result<Response, HttpServiceError> {
        let find = command::find_by_id(
            &document_path.database,
            &document_path.collection,
            parse_document_id(&document_path.document_id),
        );
        let reply = service.execute(session, find).await?;
        let document = command::first_batch(command::FIND, &reply)?.into_iter().next().ok_or(HttpServiceError::NotFound {})?;
        Ok(JsonBody(encode_document(document)).into_response())
    }

    async fn documents_insert(
        State(service): State<Arc<HTTPDocwayService>>,
        collection_path: CollectionPath,
        RequestSession(session): RequestSession,
        JsonBody(body): JsonBody<serde_json::Value>,
    ) -> Result<Response, HttpServiceError> {
        let (id, document) = decode_document(body)?;
        let insert = command::insert_one(&collection_path.database, &collection_path.collection, document);
        let reply = service.execute(session, insert).await?;
        command::check_write_errors(&reply)?;
        let location =
            format!("/{}/{}/{}", collection_path.database, collection_path.collection, format_document_id(&id));
        Ok((StatusCode::CREATED, [(LOCATION, location)]).into_response())
    }

    /// Runs `command` in the request's session if it named one, otherwise without a session.
    async fn execute(&self, session: Option<ClientSessionState>, command: Command) -> Result<Document, DriverError> {
        match session {
            Some(mut session) => {
                let result = session.execute(command).await;
                session.close();
                result
            }
            None => {
                trace!("Sending '{}' without a session", command.name());
                self.session_service.gateway().client().execute(command).await
            }
        }
    }
}
