//! Cluster Session: one ZooKeeper client plus one Kafka client bootstrapped
//! from the brokers ZooKeeper knows about.
//!
//! Lifecycle:
//! - `new` builds a disconnected session, `connect` opens both clients.
//! - Both clients live in one `Option`, so they are present or absent together.
//! - `close` drops them for good; a closed session is never reconnected.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use tracing::{info, warn};

use crate::cluster::coordinator::Coordinator;
use crate::cluster::ClusterSource;
use crate::config::SessionConfig;
use crate::error::{Lookup, MonitorError};

struct Clients {
    coordinator: Coordinator,
    consumer: BaseConsumer,
}

pub struct ClusterSession {
    address: String,
    config: SessionConfig,
    clients: RwLock<Option<Clients>>,
    closed: AtomicBool,
}

impl ClusterSession {
    pub fn new(address: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            address: address.into(),
            config,
            clients: RwLock::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// `new` + `connect`.
    pub fn open(address: impl Into<String>, config: SessionConfig) -> Result<Self, MonitorError> {
        let session = Self::new(address, config);
        session.connect()?;
        Ok(session)
    }

    /// Connects to ZooKeeper, resolves the broker list and opens a Kafka
    /// client against it. Nothing is kept unless every step succeeds.
    pub fn connect(&self) -> Result<(), MonitorError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MonitorError::NotConnected);
        }
        let mut slot = self.clients.write();
        if slot.is_some() {
            return Ok(());
        }

        let coordinator = Coordinator::connect(&self.address, self.config.zookeeper_timeout)?;
        let consumer = match self.open_consumer(&coordinator) {
            Ok(consumer) => consumer,
            Err(e) => {
                coordinator.close();
                return Err(e);
            }
        };

        *slot = Some(Clients { coordinator, consumer });
        info!("[ClusterSession] Connected to {}", self.address);
        Ok(())
    }

    fn open_consumer(&self, coordinator: &Coordinator) -> Result<BaseConsumer, MonitorError> {
        let brokers = coordinator
            .broker_list()
            .map_err(|e| MonitorError::connection(&self.address, format!("broker discovery: {}", e)))?;
        if brokers.is_empty() {
            return Err(MonitorError::connection(&self.address, "no brokers registered"));
        }

        let timeout_ms = self.config.kafka_timeout.as_millis().to_string();
        let consumer: BaseConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers.join(","))
            .set("group.id", &self.config.client_id)
            .set("client.id", &self.config.client_id)
            .set("enable.auto.commit", "false")
            .set("socket.timeout.ms", &timeout_ms)
            .create()
            .map_err(|e| MonitorError::connection(&self.address, format!("kafka client: {}", e)))?;

        // Probe: a client that cannot fetch metadata is not a usable session.
        consumer
            .fetch_metadata(None, self.config.kafka_timeout)
            .map_err(|e| MonitorError::connection(&self.address, format!("kafka metadata: {}", e)))?;

        info!("[ClusterSession] {} resolved brokers {:?}", self.address, brokers);
        Ok(consumer)
    }

    fn with_clients<T>(&self, f: impl FnOnce(&Clients) -> Result<T, MonitorError>) -> Result<T, MonitorError> {
        let guard = self.clients.read();
        let clients = guard.as_ref().ok_or(MonitorError::NotConnected)?;
        f(clients)
    }
}

impl ClusterSource for ClusterSession {
    fn address(&self) -> &str {
        &self.address
    }

    fn is_connected(&self) -> bool {
        self.clients.read().is_some()
    }

    fn fetch_topics(&self) -> Result<Vec<String>, MonitorError> {
        self.with_clients(|c| {
            let metadata = c
                .consumer
                .fetch_metadata(None, self.config.kafka_timeout)
                .map_err(|e| MonitorError::fetch(Lookup::Topics, e))?;
            Ok(metadata.topics().iter().map(|t| t.name().to_string()).collect())
        })
    }

    fn fetch_partitions(&self, topic: &str) -> Result<Vec<i32>, MonitorError> {
        let lookup = || Lookup::Partitions { topic: topic.to_string() };
        self.with_clients(|c| {
            let metadata = c
                .consumer
                .fetch_metadata(Some(topic), self.config.kafka_timeout)
                .map_err(|e| MonitorError::fetch(lookup(), e))?;
            let entry = metadata
                .topics()
                .iter()
                .find(|t| t.name() == topic)
                .ok_or_else(|| MonitorError::fetch(lookup(), "topic missing from metadata"))?;
            if let Some(err) = entry.error() {
                return Err(MonitorError::fetch(lookup(), format!("{:?}", err)));
            }
            let mut partitions: Vec<i32> = entry.partitions().iter().map(|p| p.id()).collect();
            partitions.sort_unstable();
            Ok(partitions)
        })
    }

    fn fetch_watermark(&self, topic: &str, partition: i32) -> Result<i64, MonitorError> {
        self.with_clients(|c| {
            let (_low, high) = c
                .consumer
                .fetch_watermarks(topic, partition, self.config.kafka_timeout)
                .map_err(|e| {
                    MonitorError::fetch(Lookup::Watermark { topic: topic.to_string(), partition }, e)
                })?;
            Ok(high)
        })
    }

    fn fetch_consumer_groups(&self) -> Result<Vec<String>, MonitorError> {
        self.with_clients(|c| c.coordinator.consumer_groups())
    }

    fn fetch_committed_offset(&self, group: &str, topic: &str, partition: i32) -> Result<i64, MonitorError> {
        self.with_clients(|c| c.coordinator.committed_offset(group, topic, partition))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(clients) = self.clients.write().take() {
            clients.coordinator.close();
            drop(clients.consumer);
            info!("[ClusterSession] Closed session for {}", self.address);
        }
    }
}

impl Drop for ClusterSession {
    fn drop(&mut self) {
        if self.clients.get_mut().is_some() {
            warn!("[ClusterSession] {} dropped while connected, closing", self.address);
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unopened_session_refuses_fetches() {
        let session = ClusterSession::new("127.0.0.1:2181", SessionConfig::default());
        assert!(!session.is_connected());
        assert!(matches!(session.fetch_topics(), Err(MonitorError::NotConnected)));
        assert!(matches!(session.fetch_partitions("orders"), Err(MonitorError::NotConnected)));
        assert!(matches!(session.fetch_watermark("orders", 0), Err(MonitorError::NotConnected)));
        assert!(matches!(session.fetch_consumer_groups(), Err(MonitorError::NotConnected)));
        assert!(matches!(
            session.fetch_committed_offset("billing", "orders", 0),
            Err(MonitorError::NotConnected)
        ));
    }

    #[test]
    fn closed_session_cannot_reconnect() {
        let session = ClusterSession::new("127.0.0.1:2181", SessionConfig::default());
        session.close();
        session.close();
        assert!(matches!(session.connect(), Err(MonitorError::NotConnected)));
        assert!(matches!(session.fetch_topics(), Err(MonitorError::NotConnected)));
    }
}
