//! Key lookup server

use std::net::SocketAddr;
use std::sync::Arc;

use keylookup_core::ServiceConfig;
use tokio::net::TcpListener;

use crate::error::{Result, ServerError};
use crate::routes::create_router;
use crate::state::{ServerState, SharedState};

/// HTTP front for a [`keylookup_core::KeyService`]
pub struct KeyServer {
    state: SharedState,
    addr: SocketAddr,
}

impl KeyServer {
    pub fn new(state: ServerState, addr: SocketAddr) -> Self {
        Self {
            state: Arc::new(state),
            addr,
        }
    }

    /// Run the server
    pub async fn run(self) -> Result<()> {
        let router = create_router(self.state);

        tracing::info!("Starting key lookup server on {}", self.addr);

        let listener = TcpListener::bind(self.addr).await?;
        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Builder for KeyServer
pub struct ServerBuilder {
    config: ServiceConfig,
    addr: SocketAddr,
    metrics: bool,
}

impl ServerBuilder {
    pub fn new(config: ServiceConfig) -> Self {
        let addr = ([0, 0, 0, 0], config.listen_port).into();
        Self {
            config,
            addr,
            metrics: false,
        }
    }

    pub fn addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.addr = ([0, 0, 0, 0], port).into();
        self.config.listen_port = port;
        self
    }

    /// Install a global Prometheus recorder and serve it on `/metrics`
    pub fn with_metrics(mut self) -> Self {
        self.metrics = true;
        self
    }

    pub fn build(self) -> Result<KeyServer> {
        let handle = if self.metrics {
            Some(crate::metrics::init_prometheus_recorder().map_err(|e| ServerError::Internal(e.to_string()))?)
        } else {
            None
        };

        let mut state = ServerState::load(self.config)?;
        if let Some(handle) = handle {
            state = state.with_metrics(handle);
        }

        Ok(KeyServer::new(state, self.addr))
    }
}
