//! Query Service: HTTP surface over the aggregation engine.
//!
//! Every route shares one handler; routes differ only in the `ViewProducer`
//! they pass in. Sessions come from the shared `SessionRegistry`.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, MethodRouter},
    Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::compression::CompressionLayer;
use tracing::{debug, info, warn};

use crate::cluster::{ClusterSource, SessionRegistry};
use crate::config::HttpServerConfig;
use crate::error::MonitorError;
use crate::offsets::aggregator::{render_group_distance, render_group_offsets, render_latest_offsets};

/// Builds one serialized view from a session.
pub type ViewProducer = fn(&dyn ClusterSource) -> Result<String, MonitorError>;

#[derive(Clone)]
pub struct QueryService {
    registry: Arc<SessionRegistry>,
    callback_parentheses: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    #[serde(default)]
    pub zookeeper: String,
    #[serde(default)]
    pub callback: String,
}

impl QueryService {
    pub fn new(registry: Arc<SessionRegistry>, callback_parentheses: bool) -> Self {
        Self {
            registry,
            callback_parentheses,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Resolves the session and runs `producer` on the blocking pool.
    pub async fn produce(&self, zookeeper: String, producer: ViewProducer) -> Result<String, MonitorError> {
        let registry = self.registry.clone();
        tokio::task::spawn_blocking(move || {
            let session = registry.get_or_create(&zookeeper)?;
            producer(session.as_ref())
        })
        .await?
    }

    fn wrap_callback(&self, callback: &str, payload: String) -> String {
        match (callback.is_empty(), self.callback_parentheses) {
            (true, _) => payload,
            (false, true) => format!("{}({})", callback, payload),
            (false, false) => format!("{}{}", callback, payload),
        }
    }
}

pub fn router(service: QueryService, config: &HttpServerConfig) -> Router {
    Router::new()
        .route(config.latest_offset_route(), view_route(render_latest_offsets))
        .route(config.consumer_group_offset_route(), view_route(render_group_offsets))
        .route(config.consumer_group_distance_route(), view_route(render_group_distance))
        .layer(CompressionLayer::new())
        .with_state(service)
}

fn view_route(producer: ViewProducer) -> MethodRouter<QueryService> {
    get(move |State(service): State<QueryService>, Query(query): Query<ViewQuery>| async move {
        serve_view(service, query, producer).await
    })
}

async fn serve_view(service: QueryService, query: ViewQuery, producer: ViewProducer) -> Response {
    debug!("[QueryService] View requested for '{}'", query.zookeeper);
    match service.produce(query.zookeeper.clone(), producer).await {
        Ok(payload) => {
            let content_type = if query.callback.is_empty() {
                "application/json"
            } else {
                "application/javascript"
            };
            let body = service.wrap_callback(&query.callback, payload);
            ([(header::CONTENT_TYPE, content_type)], body).into_response()
        }
        Err(e) => {
            warn!("[QueryService] Request for '{}' failed: {}", query.zookeeper, e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub async fn bind(config: &HttpServerConfig) -> Result<TcpListener, MonitorError> {
    let addr = config.bind_addr();
    TcpListener::bind(&addr)
        .await
        .map_err(|e| MonitorError::ConfigurationFailure(format!("cannot bind {}: {}", addr, e)))
}

/// Serves until `shutdown` is cancelled, then drains in-flight requests.
pub async fn serve(listener: TcpListener, app: Router, shutdown: CancellationToken) -> Result<(), MonitorError> {
    let addr = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    info!("🌐 Offset queries available at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| MonitorError::connection(&addr, e))
}
