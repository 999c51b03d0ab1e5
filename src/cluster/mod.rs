pub mod coordinator;
pub mod registry;
pub mod session;

pub use registry::SessionRegistry;
pub use session::ClusterSession;

use crate::error::MonitorError;

/// Everything the aggregation engine needs from a cluster.
///
/// All calls are blocking network round-trips with no caching behind them;
/// implementations must be safe to share between concurrent callers.
pub trait ClusterSource: Send + Sync {
    fn address(&self) -> &str;

    fn is_connected(&self) -> bool;

    fn fetch_topics(&self) -> Result<Vec<String>, MonitorError>;

    /// Partition ids of `topic`, ascending.
    fn fetch_partitions(&self, topic: &str) -> Result<Vec<i32>, MonitorError>;

    /// Newest offset of a partition (the position after the last record).
    fn fetch_watermark(&self, topic: &str, partition: i32) -> Result<i64, MonitorError>;

    fn fetch_consumer_groups(&self) -> Result<Vec<String>, MonitorError>;

    fn fetch_committed_offset(&self, group: &str, topic: &str, partition: i32) -> Result<i64, MonitorError>;

    /// Idempotent. Every fetch afterwards fails with `NotConnected`.
    fn close(&self);
}
