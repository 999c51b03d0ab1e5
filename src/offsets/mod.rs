pub mod aggregator;
pub mod views;

pub use aggregator::{compute_group_offsets, compute_lag, compute_watermarks, render};
pub use views::{GroupOffsetView, LagView, PartitionOffsets, WatermarkView, TOTAL_KEY};
