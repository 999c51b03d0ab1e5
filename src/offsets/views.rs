use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Synthetic key holding the sum over a topic's partitions.
pub const TOTAL_KEY: &str = "total";

/// Partition id (as a decimal string) → offset, plus `"total"`.
pub type PartitionOffsets = BTreeMap<String, i64>;

/// Topic → partition watermarks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatermarkView(pub BTreeMap<String, PartitionOffsets>);

/// Group → topic → committed offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupOffsetView(pub BTreeMap<String, BTreeMap<String, PartitionOffsets>>);

/// Group → topic → `watermark - committed` per partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LagView(pub BTreeMap<String, BTreeMap<String, PartitionOffsets>>);

impl WatermarkView {
    pub fn topic(&self, topic: &str) -> Option<&PartitionOffsets> {
        self.0.get(topic)
    }

    pub fn watermark(&self, topic: &str, partition: i32) -> Option<i64> {
        self.0.get(topic)?.get(&partition_key(partition)).copied()
    }
}

impl GroupOffsetView {
    pub fn get(&self, group: &str, topic: &str) -> Option<&PartitionOffsets> {
        self.0.get(group)?.get(topic)
    }
}

impl LagView {
    pub fn get(&self, group: &str, topic: &str) -> Option<&PartitionOffsets> {
        self.0.get(group)?.get(topic)
    }
}

pub fn partition_key(partition: i32) -> String {
    partition.to_string()
}

/// Collects per-partition values for one topic and tracks their running sum.
#[derive(Debug, Default)]
pub struct TopicOffsets {
    values: PartitionOffsets,
    total: i64,
}

impl TopicOffsets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, partition: i32, value: i64) {
        self.values.insert(partition_key(partition), value);
        self.total = self.total.saturating_add(value);
    }

    pub fn finish(mut self) -> PartitionOffsets {
        self.values.insert(TOTAL_KEY.to_string(), self.total);
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_running_sum() {
        let mut offsets = TopicOffsets::new();
        offsets.record(0, 100);
        offsets.record(1, 50);
        let map = offsets.finish();
        assert_eq!(map.get("0"), Some(&100));
        assert_eq!(map.get("1"), Some(&50));
        assert_eq!(map.get(TOTAL_KEY), Some(&150));
    }

    #[test]
    fn empty_topic_still_has_total() {
        let map = TopicOffsets::new().finish();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(TOTAL_KEY), Some(&0));
    }

    #[test]
    fn views_serialize_as_plain_maps() {
        let mut offsets = TopicOffsets::new();
        offsets.record(0, 3);
        let mut view = WatermarkView::default();
        view.0.insert("orders".to_string(), offsets.finish());
        let json = serde_json::to_string(&view).unwrap();
        assert_eq!(json, r#"{"orders":{"0":3,"total":3}}"#);
    }
}
