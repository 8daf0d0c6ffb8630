//! Node server: wires configuration into the HTTP API

use axum::Router;
use std::sync::Arc;

use crate::common::audit::AuditLogger;
use crate::common::auth::{Authorizer, GrantAuthorizer};
use crate::common::auth_middleware::AuthState;
use crate::common::{Config, Result};
use crate::coordinator::cluster::ClusterNode;
use crate::coordinator::handler::RequestHandler;
use crate::coordinator::http::{create_router, AppState};
use crate::coordinator::router::{HttpForwarder, ReplicationRouter};
use crate::coordinator::write::WriteCoordinator;
use crate::port::{Port, PortFacade};

pub struct Node {
    config: Config,
    state: AppState,
}

impl Node {
    pub fn new(config: Config) -> Result<Self> {
        let cluster = Arc::new(ClusterNode::new(config.node_id.clone(), &config.cluster));
        let forwarder = Arc::new(HttpForwarder::new(std::time::Duration::from_millis(
            config.cluster.forward_timeout_ms,
        ))?);
        let router = Arc::new(ReplicationRouter::new(cluster.clone(), forwarder));
        Self::with_router(config, cluster, router)
    }

    /// Build a node around an existing cluster view and router
    pub fn with_router(
        config: Config,
        cluster: Arc<ClusterNode>,
        router: Arc<ReplicationRouter>,
    ) -> Result<Self> {
        let audit = Arc::new(match &config.audit.path {
            Some(path) => AuditLogger::open(path)?,
            None => AuditLogger::tracing_only(),
        });

        let authorizer: Arc<dyn Authorizer> = Arc::new(GrantAuthorizer::new(config.grants.clone()));
        let facade = Arc::new(PortFacade::new(authorizer));
        for seed in config.ports.iter().cloned() {
            facade.insert(Port::from(seed), 0);
        }

        let writes = Arc::new(WriteCoordinator::new(config.write_lock_timeout()));
        let ports = RequestHandler::new("input port", facade, writes.clone(), router, audit);

        let state = AppState {
            ports,
            cluster,
            writes,
            base_url: Arc::from(config.base_url.as_str()),
        };
        Ok(Self { config, state })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn app(&self) -> Router {
        create_router(self.state.clone(), AuthState::new(self.config.auth.clone()))
    }

    pub async fn serve(self) -> Result<()> {
        tracing::info!("Starting flowcoord v{} node: {}", crate::VERSION, self.config.node_id);
        tracing::info!("  HTTP API: {}", self.config.bind_addr);
        tracing::info!("  Role: {}", self.state.cluster.role());
        tracing::info!("  Ports loaded: {}", self.state.ports.facade().len());
        tracing::info!(
            "  Authentication: {}",
            if self.config.auth.enabled { "enabled" } else { "disabled" }
        );

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        let app = self.app();

        tracing::info!("✓ Node ready");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Node stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
