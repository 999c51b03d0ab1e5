//! ZooKeeper side of a cluster session: broker discovery, consumer group
//! enumeration and committed offsets stored under `/consumers`.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};
use zookeeper::{WatchedEvent, Watcher, ZkError, ZooKeeper};

use crate::error::{Lookup, MonitorError};

const BROKER_IDS_PATH: &str = "/brokers/ids";
const CONSUMERS_PATH: &str = "/consumers";

/// Broker registration as written by Kafka under `/brokers/ids/<id>`.
#[derive(Debug, Deserialize)]
struct BrokerRegistration {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<i32>,
    #[serde(default)]
    endpoints: Vec<String>,
}

impl BrokerRegistration {
    /// `host:port`, falling back to the first listener endpoint when the
    /// legacy fields are unset (brokers with only SSL/SASL listeners).
    fn address(&self) -> Option<String> {
        match (&self.host, self.port) {
            (Some(host), Some(port)) if !host.is_empty() && port > 0 => {
                Some(format!("{}:{}", host, port))
            }
            _ => self.endpoints.first().map(|endpoint| {
                endpoint
                    .split_once("://")
                    .map(|(_, addr)| addr.to_string())
                    .unwrap_or_else(|| endpoint.clone())
            }),
        }
    }
}

struct SessionWatcher {
    address: String,
}

impl Watcher for SessionWatcher {
    fn handle(&self, event: WatchedEvent) {
        debug!("[Coordinator:{}] {:?}", self.address, event);
    }
}

pub struct Coordinator {
    zk: ZooKeeper,
}

impl Coordinator {
    pub fn connect(address: &str, timeout: Duration) -> Result<Self, MonitorError> {
        let watcher = SessionWatcher { address: address.to_string() };
        let zk = ZooKeeper::connect(address, timeout, watcher)
            .map_err(|e| MonitorError::connection(address, e))?;
        Ok(Self { zk })
    }

    pub fn broker_list(&self) -> Result<Vec<String>, ZkError> {
        let mut ids = self.zk.get_children(BROKER_IDS_PATH, false)?;
        ids.sort();

        let mut brokers = Vec::with_capacity(ids.len());
        for id in ids {
            let path = format!("{}/{}", BROKER_IDS_PATH, id);
            let (data, _) = match self.zk.get_data(&path, false) {
                Ok(node) => node,
                // Broker deregistered between the listing and the read.
                Err(ZkError::NoNode) => continue,
                Err(e) => return Err(e),
            };
            match serde_json::from_slice::<BrokerRegistration>(&data) {
                Ok(registration) => match registration.address() {
                    Some(addr) => brokers.push(addr),
                    None => warn!("[Coordinator] Broker {} has no usable endpoint", id),
                },
                Err(e) => warn!("[Coordinator] Broker {} registration unreadable: {}", id, e),
            }
        }
        Ok(brokers)
    }

    pub fn consumer_groups(&self) -> Result<Vec<String>, MonitorError> {
        match self.zk.get_children(CONSUMERS_PATH, false) {
            Ok(mut groups) => {
                groups.sort();
                Ok(groups)
            }
            Err(ZkError::NoNode) => Ok(Vec::new()),
            Err(e) => Err(MonitorError::fetch(Lookup::ConsumerGroups, e)),
        }
    }

    /// Committed offset of `group` for one partition. A group that never
    /// committed on this partition reports zero.
    pub fn committed_offset(&self, group: &str, topic: &str, partition: i32) -> Result<i64, MonitorError> {
        let lookup = || Lookup::CommittedOffset {
            group: group.to_string(),
            topic: topic.to_string(),
            partition,
        };
        let path = format!("{}/{}/offsets/{}/{}", CONSUMERS_PATH, group, topic, partition);
        match self.zk.get_data(&path, false) {
            Ok((data, _)) => parse_offset(&data).map_err(|reason| MonitorError::fetch(lookup(), reason)),
            Err(ZkError::NoNode) => Ok(0),
            Err(e) => Err(MonitorError::fetch(lookup(), e)),
        }
    }

    pub fn close(&self) {
        if let Err(e) = self.zk.close() {
            warn!("[Coordinator] Close failed: {}", e);
        }
    }
}

fn parse_offset(data: &[u8]) -> Result<i64, String> {
    let text = std::str::from_utf8(data).map_err(|e| e.to_string())?;
    text.trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid offset '{}': {}", text.trim(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_host_port_registration() {
        let reg: BrokerRegistration =
            serde_json::from_str(r#"{"host":"kafka-1","port":9092,"version":1,"jmx_port":-1}"#).unwrap();
        assert_eq!(reg.address().as_deref(), Some("kafka-1:9092"));
    }

    #[test]
    fn endpoint_only_registration() {
        let reg: BrokerRegistration = serde_json::from_str(
            r#"{"host":null,"port":-1,"endpoints":["SASL_SSL://kafka-2:9094"],"version":4}"#,
        )
        .unwrap();
        assert_eq!(reg.address().as_deref(), Some("kafka-2:9094"));
    }

    #[test]
    fn offset_node_parsing() {
        assert_eq!(parse_offset(b"42"), Ok(42));
        assert_eq!(parse_offset(b" 7\n"), Ok(7));
        assert!(parse_offset(b"forty-two").is_err());
    }
}
