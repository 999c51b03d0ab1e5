//! Error taxonomy shared by the session, the aggregation engine and both transports.

use std::fmt;
use thiserror::Error;

/// Which cluster lookup failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Topics,
    Partitions { topic: String },
    Watermark { topic: String, partition: i32 },
    ConsumerGroups,
    CommittedOffset { group: String, topic: String, partition: i32 },
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Topics => write!(f, "topic listing"),
            Lookup::Partitions { topic } => write!(f, "partition listing for topic '{}'", topic),
            Lookup::Watermark { topic, partition } => {
                write!(f, "watermark fetch for {}/{}", topic, partition)
            }
            Lookup::ConsumerGroups => write!(f, "consumer group listing"),
            Lookup::CommittedOffset { group, topic, partition } => {
                write!(f, "offset fetch for group '{}' on {}/{}", group, topic, partition)
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("connection to {address} failed: {reason}")]
    ConnectionFailure { address: String, reason: String },

    #[error("not connected, open the session first")]
    NotConnected,

    #[error("{lookup} failed: {reason}")]
    FetchFailure { lookup: Lookup, reason: String },

    #[error("serialization failed: {0}")]
    SerializationFailure(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    ConfigurationFailure(String),

    #[error("time-series write failed: {0}")]
    SinkFailure(String),

    #[error("background task failed: {0}")]
    TaskFailure(#[from] tokio::task::JoinError),
}

impl MonitorError {
    pub fn connection(address: &str, reason: impl fmt::Display) -> Self {
        MonitorError::ConnectionFailure {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn fetch(lookup: Lookup, reason: impl fmt::Display) -> Self {
        MonitorError::FetchFailure {
            lookup,
            reason: reason.to_string(),
        }
    }
}
