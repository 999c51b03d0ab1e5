pub mod cluster;
pub mod config;
pub mod error;
pub mod offsets;
pub mod publisher;
pub mod server;
pub mod utils;

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cluster::SessionRegistry;
use crate::config::{MonitorConfig, SessionConfig};
use crate::error::MonitorError;
use crate::publisher::Publisher;
use crate::server::query_api::{self, QueryService};

// ========================================
// SUPERVISOR
// ========================================

/// Wires one Query Service and every configured publisher together and
/// owns their shutdown.
pub struct OffsetMonitor {
    config: MonitorConfig,
    session_config: SessionConfig,
    registry: Arc<SessionRegistry>,
    publishers: Vec<Publisher>,
    shutdown: CancellationToken,
    server: Option<JoinHandle<Result<(), MonitorError>>>,
}

impl OffsetMonitor {
    pub fn new(config: MonitorConfig) -> Result<Self, MonitorError> {
        let session_config = config.session.resolve()?;
        let registry = Arc::new(SessionRegistry::kafka(session_config.clone()));
        Ok(Self {
            config,
            session_config,
            registry,
            publishers: Vec::new(),
            shutdown: CancellationToken::new(),
            server: None,
        })
    }

    /// Starts publishers first, then the HTTP listener. A publisher that
    /// cannot initialize is dropped; a listener that cannot bind is fatal.
    pub async fn start(&mut self) -> Result<(), MonitorError> {
        for syncer in &self.config.influxdb_syncers {
            let mut publisher: Publisher = Publisher::new(syncer.resolve());
            let started = match publisher.init(self.session_config.clone()).await {
                Ok(()) => publisher.start(),
                Err(e) => Err(e),
            };
            match started {
                Ok(()) => self.publishers.push(publisher),
                Err(e) => {
                    error!("[OffsetMonitor] Publisher for {} disabled: {}", publisher.config().zookeeper, e);
                    publisher.close().await;
                }
            }
        }
        info!("[OffsetMonitor] {} publisher(s) running", self.publishers.len());

        let service = QueryService::new(self.registry.clone(), self.config.http_server.callback_parentheses);
        let app = query_api::router(service, &self.config.http_server);
        let listener = query_api::bind(&self.config.http_server).await?;
        self.server = Some(tokio::spawn(query_api::serve(listener, app, self.shutdown.clone())));
        Ok(())
    }

    pub async fn close(&mut self) {
        self.shutdown.cancel();
        if let Some(server) = self.server.take() {
            match server.await {
                Ok(Err(e)) => error!("[OffsetMonitor] Query server stopped with error: {}", e),
                Err(e) => error!("[OffsetMonitor] Query server task failed: {}", e),
                Ok(Ok(())) => {}
            }
        }
        join_all(self.publishers.iter_mut().map(|p| p.close())).await;

        let registry = self.registry.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || registry.close_all()).await {
            error!("[OffsetMonitor] Closing cached sessions failed: {}", e);
        }
        info!("[OffsetMonitor] Shutdown complete");
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }
}
