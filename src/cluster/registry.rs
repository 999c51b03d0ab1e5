//! Session Registry: one shared `ClusterSession` per ZooKeeper address,
//! created lazily on first use.
//!
//! Cached sessions are never health-checked or evicted. A session whose
//! cluster went away keeps failing its fetches until the process restarts,
//! and every distinct address ever queried holds a connection open.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::cluster::{ClusterSession, ClusterSource};
use crate::config::{zookeeper_or_default, SessionConfig};
use crate::error::MonitorError;

/// Opens a new connected session for an address.
pub type SessionConnector =
    Arc<dyn Fn(&str) -> Result<Arc<dyn ClusterSource>, MonitorError> + Send + Sync>;

pub struct SessionRegistry {
    sessions: DashMap<String, Arc<dyn ClusterSource>>,
    connector: SessionConnector,
}

impl SessionRegistry {
    pub fn new(connector: SessionConnector) -> Self {
        Self {
            sessions: DashMap::new(),
            connector,
        }
    }

    /// Registry backed by real ZooKeeper/Kafka sessions.
    pub fn kafka(config: SessionConfig) -> Self {
        Self::new(Arc::new(move |address: &str| -> Result<Arc<dyn ClusterSource>, MonitorError> {
            let session = ClusterSession::open(address, config.clone())?;
            Ok(Arc::new(session))
        }))
    }

    /// Blocking: may open a new session.
    pub fn get_or_create(&self, address: &str) -> Result<Arc<dyn ClusterSource>, MonitorError> {
        let address = zookeeper_or_default(address);
        if let Some(session) = self.sessions.get(&address) {
            return Ok(session.value().clone());
        }

        // Connect outside the map lock so one slow cluster never stalls
        // lookups for other addresses on the same shard.
        let fresh = (self.connector)(&address)?;
        let kept = self
            .sessions
            .entry(address.clone())
            .or_insert_with(|| fresh.clone())
            .value()
            .clone();

        if Arc::ptr_eq(&kept, &fresh) {
            info!("[SessionRegistry] Cached new session for {}", address);
        } else {
            debug!("[SessionRegistry] Lost creation race for {}, closing duplicate", address);
            fresh.close();
        }
        Ok(kept)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Closes and forgets every cached session.
    pub fn close_all(&self) {
        let addresses: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for address in addresses {
            if let Some((_, session)) = self.sessions.remove(&address) {
                session.close();
            }
        }
    }
}
