pub mod influx;
pub mod point;
pub mod syncer;

pub use influx::{InfluxSink, PointSink};
pub use point::Point;
pub use syncer::{Publisher, PublisherState};
