//! Offset Aggregation Engine.
//!
//! Three read-only computations over a `ClusterSource`. Each call re-fetches
//! topics, partitions and groups; nothing is shared between calls. The first
//! failed lookup aborts the whole computation, no partial view is returned.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cluster::ClusterSource;
use crate::error::{Lookup, MonitorError};
use crate::offsets::views::{GroupOffsetView, LagView, PartitionOffsets, TopicOffsets, WatermarkView};

pub fn compute_watermarks<S: ClusterSource + ?Sized>(session: &S) -> Result<WatermarkView, MonitorError> {
    let mut view = WatermarkView::default();
    for topic in session.fetch_topics()? {
        let mut offsets = TopicOffsets::new();
        for partition in session.fetch_partitions(&topic)? {
            offsets.record(partition, session.fetch_watermark(&topic, partition)?);
        }
        view.0.insert(topic, offsets.finish());
    }
    Ok(view)
}

/// Committed offsets for every (group, topic) pair. Topics come from the
/// cluster-wide listing, not from each group's subscriptions, so a group
/// reports zeros for topics it never consumed.
pub fn compute_group_offsets<S: ClusterSource + ?Sized>(session: &S) -> Result<GroupOffsetView, MonitorError> {
    let rows = walk_groups(session, |_, _, _, committed| Ok(committed))?;
    Ok(GroupOffsetView(rows))
}

/// Lag for every (group, topic, partition). The per-topic total is the sum
/// of the per-partition lags, not the difference of the two totals.
pub fn compute_lag<S: ClusterSource + ?Sized>(session: &S) -> Result<LagView, MonitorError> {
    let watermarks = compute_watermarks(session)?;
    let rows = walk_groups(session, |_, topic, partition, committed| {
        // The partition set may have grown since the watermark pass.
        let high = watermarks.watermark(topic, partition).ok_or_else(|| {
            MonitorError::fetch(
                Lookup::Watermark { topic: topic.to_string(), partition },
                "partition absent from watermark snapshot",
            )
        })?;
        Ok(high.saturating_sub(committed))
    })?;
    Ok(LagView(rows))
}

type GroupRows = BTreeMap<String, BTreeMap<String, PartitionOffsets>>;

/// Group × topic × partition traversal shared by the offset and lag views.
/// `value` maps (group, topic, partition, committed offset) to the cell.
fn walk_groups<S, F>(session: &S, mut value: F) -> Result<GroupRows, MonitorError>
where
    S: ClusterSource + ?Sized,
    F: FnMut(&str, &str, i32, i64) -> Result<i64, MonitorError>,
{
    let groups = session.fetch_consumer_groups()?;
    let topics = session.fetch_topics()?;

    let mut rows = GroupRows::new();
    for group in groups {
        let mut per_topic = BTreeMap::new();
        for topic in &topics {
            let mut offsets = TopicOffsets::new();
            for partition in session.fetch_partitions(topic)? {
                let committed = session.fetch_committed_offset(&group, topic, partition)?;
                offsets.record(partition, value(&group, topic, partition, committed)?);
            }
            per_topic.insert(topic.clone(), offsets.finish());
        }
        rows.insert(group, per_topic);
    }
    Ok(rows)
}

/// JSON encoding used by every transport.
pub fn render<V: Serialize>(view: &V) -> Result<String, MonitorError> {
    Ok(serde_json::to_string(view)?)
}

pub fn render_latest_offsets(session: &dyn ClusterSource) -> Result<String, MonitorError> {
    render(&compute_watermarks(session)?)
}

pub fn render_group_offsets(session: &dyn ClusterSource) -> Result<String, MonitorError> {
    render(&compute_group_offsets(session)?)
}

pub fn render_group_distance(session: &dyn ClusterSource) -> Result<String, MonitorError> {
    render(&compute_lag(session)?)
}
