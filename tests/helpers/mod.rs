#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use kafka_offset_monitor::cluster::{ClusterSource, SessionRegistry};
use kafka_offset_monitor::error::{Lookup, MonitorError};
use kafka_offset_monitor::publisher::{Point, PointSink};
use parking_lot::Mutex;

// ========================================
// IN-MEMORY CLUSTER
// ========================================

#[derive(Default)]
struct Topology {
    topics: BTreeMap<String, Vec<i32>>,
    watermarks: HashMap<(String, i32), i64>,
    groups: Vec<String>,
    committed: HashMap<(String, String, i32), i64>,
    // Successive answers for partition listings, consumed before `topics`.
    partition_script: HashMap<String, VecDeque<Vec<i32>>>,
    broken_partition_listing: HashSet<String>,
    broken_topic_listing: bool,
    broken_group_listing: bool,
    broken_watermarks: HashSet<(String, i32)>,
    broken_commits: HashSet<(String, String, i32)>,
}

pub struct FakeCluster {
    address: String,
    topology: Mutex<Topology>,
    connected: AtomicBool,
    pub io_calls: AtomicUsize,
}

impl FakeCluster {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            topology: Mutex::new(Topology::default()),
            connected: AtomicBool::new(true),
            io_calls: AtomicUsize::new(0),
        }
    }

    /// `orders` with partitions [0, 1] at watermarks [100, 50], and group
    /// `billing` committed at [90, 50].
    pub fn orders_and_billing() -> Self {
        let cluster = Self::new("fake:2181");
        cluster.set_topic("orders", &[(0, 100), (1, 50)]);
        cluster.add_group("billing");
        cluster.commit("billing", "orders", 0, 90);
        cluster.commit("billing", "orders", 1, 50);
        cluster
    }

    pub fn set_topic(&self, topic: &str, watermarks: &[(i32, i64)]) {
        let mut t = self.topology.lock();
        t.topics.insert(topic.to_string(), watermarks.iter().map(|(p, _)| *p).collect());
        for (partition, high) in watermarks {
            t.watermarks.insert((topic.to_string(), *partition), *high);
        }
    }

    pub fn add_group(&self, group: &str) {
        self.topology.lock().groups.push(group.to_string());
    }

    pub fn commit(&self, group: &str, topic: &str, partition: i32, offset: i64) {
        self.topology
            .lock()
            .committed
            .insert((group.to_string(), topic.to_string(), partition), offset);
    }

    pub fn script_partitions(&self, topic: &str, listings: Vec<Vec<i32>>) {
        self.topology
            .lock()
            .partition_script
            .insert(topic.to_string(), listings.into_iter().collect());
    }

    pub fn break_partition_listing(&self, topic: &str) {
        self.topology.lock().broken_partition_listing.insert(topic.to_string());
    }

    pub fn repair_partition_listing(&self, topic: &str) {
        self.topology.lock().broken_partition_listing.remove(topic);
    }

    pub fn break_topic_listing(&self) {
        self.topology.lock().broken_topic_listing = true;
    }

    pub fn break_group_listing(&self) {
        self.topology.lock().broken_group_listing = true;
    }

    pub fn break_watermark(&self, topic: &str, partition: i32) {
        self.topology.lock().broken_watermarks.insert((topic.to_string(), partition));
    }

    pub fn break_commit(&self, group: &str, topic: &str, partition: i32) {
        self.topology
            .lock()
            .broken_commits
            .insert((group.to_string(), topic.to_string(), partition));
    }

    pub fn io_calls(&self) -> usize {
        self.io_calls.load(Ordering::SeqCst)
    }

    fn guard(&self) -> Result<(), MonitorError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(MonitorError::NotConnected);
        }
        self.io_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl ClusterSource for FakeCluster {
    fn address(&self) -> &str {
        &self.address
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn fetch_topics(&self) -> Result<Vec<String>, MonitorError> {
        self.guard()?;
        let t = self.topology.lock();
        if t.broken_topic_listing {
            return Err(MonitorError::fetch(Lookup::Topics, "metadata request timed out"));
        }
        Ok(t.topics.keys().cloned().collect())
    }

    fn fetch_partitions(&self, topic: &str) -> Result<Vec<i32>, MonitorError> {
        self.guard()?;
        let mut t = self.topology.lock();
        if t.broken_partition_listing.contains(topic) {
            return Err(MonitorError::fetch(
                Lookup::Partitions { topic: topic.to_string() },
                "leader not available",
            ));
        }
        if let Some(listing) = t.partition_script.get_mut(topic).and_then(|q| q.pop_front()) {
            return Ok(listing);
        }
        t.topics.get(topic).cloned().ok_or_else(|| {
            MonitorError::fetch(Lookup::Partitions { topic: topic.to_string() }, "unknown topic")
        })
    }

    fn fetch_watermark(&self, topic: &str, partition: i32) -> Result<i64, MonitorError> {
        self.guard()?;
        let t = self.topology.lock();
        if t.broken_watermarks.contains(&(topic.to_string(), partition)) {
            return Err(MonitorError::fetch(
                Lookup::Watermark { topic: topic.to_string(), partition },
                "offset request timed out",
            ));
        }
        t.watermarks
            .get(&(topic.to_string(), partition))
            .copied()
            .ok_or_else(|| {
                MonitorError::fetch(Lookup::Watermark { topic: topic.to_string(), partition }, "unknown partition")
            })
    }

    fn fetch_consumer_groups(&self) -> Result<Vec<String>, MonitorError> {
        self.guard()?;
        let t = self.topology.lock();
        if t.broken_group_listing {
            return Err(MonitorError::fetch(Lookup::ConsumerGroups, "zookeeper session expired"));
        }
        Ok(t.groups.clone())
    }

    fn fetch_committed_offset(&self, group: &str, topic: &str, partition: i32) -> Result<i64, MonitorError> {
        self.guard()?;
        let t = self.topology.lock();
        let key = (group.to_string(), topic.to_string(), partition);
        if t.broken_commits.contains(&key) {
            return Err(MonitorError::fetch(
                Lookup::CommittedOffset { group: key.0, topic: key.1, partition },
                "invalid offset 'abc'",
            ));
        }
        Ok(t.committed.get(&key).copied().unwrap_or(0))
    }

    fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

// ========================================
// REGISTRY WIRING
// ========================================

/// Registry whose connector hands out `cluster` and counts connects.
pub fn registry_over(cluster: Arc<FakeCluster>) -> (Arc<SessionRegistry>, Arc<AtomicUsize>) {
    let connects = Arc::new(AtomicUsize::new(0));
    let counter = connects.clone();
    let registry = SessionRegistry::new(Arc::new(move |_address: &str| -> Result<Arc<dyn ClusterSource>, MonitorError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(cluster.clone())
    }));
    (Arc::new(registry), connects)
}

/// Registry whose every connect attempt fails.
pub fn unreachable_registry() -> Arc<SessionRegistry> {
    Arc::new(SessionRegistry::new(Arc::new(|address: &str| -> Result<Arc<dyn ClusterSource>, MonitorError> {
        Err(MonitorError::connection(address, "connection refused"))
    })))
}

// ========================================
// RECORDING SINK
// ========================================

#[derive(Clone, Default)]
pub struct RecordingSink {
    batches: Arc<Mutex<Vec<Vec<Point>>>>,
    failing: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl RecordingSink {
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.failing.store(true, Ordering::SeqCst);
        sink
    }

    pub fn batches(&self) -> Vec<Vec<Point>> {
        self.batches.lock().clone()
    }

    pub fn points(&self) -> Vec<Point> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl PointSink for RecordingSink {
    async fn write_points(&self, points: Vec<Point>) -> Result<(), MonitorError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(MonitorError::SinkFailure("503 Service Unavailable".to_string()));
        }
        self.batches.lock().push(points);
        Ok(())
    }
}
