/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

#![deny(unused_must_use)]
#![deny(elided_lifetimes_in_paths)]

use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use axum_server::Handle;
use driver::{mongo::MongoDatabaseClient, ArcDatabaseClient};
use resource::distribution_info::{DistributionInfo, DISTRIBUTION_INFO};
use session::{gateway::DatabaseGateway, options_pool::SessionOptionsPool};
use tokio::{
    net::lookup_host,
    sync::watch::{channel, Receiver, Sender},
};
use tracing::info;

use crate::{
    activation::{activate, Capabilities},
    error::ServerOpenError,
    parameters::config::Config,
    service::{http::docway_service::HTTPDocwayService, session_service::SessionService},
};

pub mod activation;
pub mod error;
pub mod parameters;
pub(crate) mod service;

#[derive(Default)]
pub struct ServerBuilder {
    database_client: Option<ArcDatabaseClient>,
    shutdown_channel: Option<(Sender<()>, Receiver<()>)>,
}

impl ServerBuilder {
    pub fn database_client(mut self, database_client: ArcDatabaseClient) -> Self {
        self.database_client = Some(database_client);
        self
    }

    pub fn shutdown_channel(mut self, shutdown_channel: (Sender<()>, Receiver<()>)) -> Self {
        self.shutdown_channel = Some(shutdown_channel);
        self
    }

    pub async fn build(self, config: Config) -> Result<Server, ServerOpenError> {
        let (shutdown_sender, shutdown_receiver) = self.shutdown_channel.unwrap_or_else(|| channel(()));
        let database_client = match self.database_client {
            Some(client) => client,
            None => Arc::new(
                MongoDatabaseClient::connect(&config.database.uri)
                    .await
                    .map_err(|docway_source| ServerOpenError::DatabaseConnection { docway_source })?,
            ),
        };

        let capabilities = activate(&database_client).await;
        let gateway = DatabaseGateway::new(
            database_client,
            Arc::new(SessionOptionsPool::new(config.sessions.options_cache_capacity)),
            config.database.transaction_defaults(),
            (&config.sessions.probe_namespace).into(),
        );
        let session_factory = capabilities.session_factory(gateway.clone());
        let session_service = SessionService::new(gateway, capabilities.topology.clone());
        let http_service = Arc::new(HTTPDocwayService::new(session_service, session_factory));
        Ok(Server::new(DISTRIBUTION_INFO, config, capabilities, http_service, shutdown_sender, shutdown_receiver))
    }
}

#[derive(Debug)]
pub struct Server {
    distribution_info: DistributionInfo,
    config: Config,
    capabilities: Capabilities,
    http_service: Arc<HTTPDocwayService>,
    shutdown_sender: Sender<()>,
    shutdown_receiver: Receiver<()>,
}

impl Server {
    fn new(
        distribution_info: DistributionInfo,
        config: Config,
        capabilities: Capabilities,
        http_service: Arc<HTTPDocwayService>,
        shutdown_sender: Sender<()>,
        shutdown_receiver: Receiver<()>,
    ) -> Self {
        Self { distribution_info, config, capabilities, http_service, shutdown_sender, shutdown_receiver }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// The complete HTTP application, as served.
    pub fn router(&self) -> Router {
        HTTPDocwayService::create_router(self.http_service.clone()).layer(HTTPDocwayService::create_cors_layer())
    }

    pub async fn serve(self) -> Result<(), ServerOpenError> {
        Self::print_hello(self.distribution_info, &self.capabilities);

        let address = Self::resolve_address(&self.config.server.address).await?;
        let router_service = self.router().into_make_service();

        let shutdown_handle = Handle::new();
        let shutdown_handle_clone = shutdown_handle.clone();
        let mut shutdown_receiver = self.shutdown_receiver;
        tokio::spawn(async move {
            if shutdown_receiver.changed().await.is_ok() {
                shutdown_handle_clone.graceful_shutdown(None); // None: indefinite shutdown time
            }
        });

        println!("Serving HTTP on {address}.");
        info!("\nReady!");
        Self::spawn_shutdown_handler(self.shutdown_sender);
        axum_server::bind(address)
            .handle(shutdown_handle)
            .serve(router_service)
            .await
            .map_err(|source| ServerOpenError::HttpServe { address, source: Arc::new(source) })
    }

    pub async fn resolve_address(address: &str) -> Result<SocketAddr, ServerOpenError> {
        lookup_host(address)
            .await
            .map_err(|source| ServerOpenError::AddressLookup { address: address.to_owned(), source: Arc::new(source) })?
            .next()
            .ok_or_else(|| ServerOpenError::CouldNotResolveAddress { address: address.to_owned() })
    }

    fn print_hello(distribution_info: DistributionInfo, capabilities: &Capabilities) {
        print!("Running {} {}", distribution_info.distribution, distribution_info.version);
        match &capabilities.server_version {
            Some(version) => print!(" against database version {version}"),
            None => print!(" against an unreachable database"),
        }
        if capabilities.transactions_enabled {
            println!(" with transactions enabled.");
        } else {
            println!(" with transactions disabled.");
        }
    }

    fn spawn_shutdown_handler(shutdown_sender: Sender<()>) {
        tokio::spawn(async move {
            Self::wait_for_ctrl_c_signal().await;
            println!("\nReceived CTRL-C. Initiating shutdown...");
            if shutdown_sender.send(()).is_err() {
                std::process::exit(1);
            }

            tokio::spawn(Self::forced_shutdown_handler());
        });
    }

    async fn forced_shutdown_handler() {
        Self::wait_for_ctrl_c_signal().await;
        println!("\nReceived CTRL-C. Forcing shutdown...");
        std::process::exit(1);
    }

    async fn wait_for_ctrl_c_signal() {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for CTRL-C signal: {err}");
            std::future::pending::<()>().await;
        }
    }
}
