use crate::offsets::{LagView, WatermarkView};

/// One labeled integer sample for the time-series sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Point {
    pub measurement: String,
    pub tags: Vec<(&'static str, String)>,
    pub value: i64,
    pub timestamp_secs: i64,
}

impl Point {
    /// InfluxDB line protocol, second precision.
    pub fn to_line(&self) -> String {
        let mut line = escape(&self.measurement, &[',', ' ']);
        for (key, value) in &self.tags {
            line.push(',');
            line.push_str(key);
            line.push('=');
            line.push_str(&escape(value, &[',', ' ', '=']));
        }
        line.push_str(&format!(" value={}i {}", self.value, self.timestamp_secs));
        line
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// One point per (topic, partition), `"total"` included.
pub fn watermark_points(view: &WatermarkView, measurement: &str, timestamp_secs: i64) -> Vec<Point> {
    let mut points = Vec::new();
    for (topic, partitions) in &view.0 {
        for (partition, offset) in partitions {
            points.push(Point {
                measurement: measurement.to_string(),
                tags: vec![("topic", topic.clone()), ("partition", partition.clone())],
                value: *offset,
                timestamp_secs,
            });
        }
    }
    points
}

/// One point per (group, topic, partition), `"total"` included.
pub fn lag_points(view: &LagView, measurement: &str, timestamp_secs: i64) -> Vec<Point> {
    let mut points = Vec::new();
    for (group, topics) in &view.0 {
        for (topic, partitions) in topics {
            for (partition, lag) in partitions {
                points.push(Point {
                    measurement: measurement.to_string(),
                    tags: vec![
                        ("group", group.clone()),
                        ("topic", topic.clone()),
                        ("partition", partition.clone()),
                    ],
                    value: *lag,
                    timestamp_secs,
                });
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_protocol_layout() {
        let point = Point {
            measurement: "latest_offset".to_string(),
            tags: vec![("topic", "orders".to_string()), ("partition", "0".to_string())],
            value: 100,
            timestamp_secs: 1_700_000_000,
        };
        assert_eq!(point.to_line(), "latest_offset,topic=orders,partition=0 value=100i 1700000000");
    }

    #[test]
    fn tag_values_are_escaped() {
        let point = Point {
            measurement: "lag data".to_string(),
            tags: vec![("group", "a,b c=d".to_string())],
            value: -3,
            timestamp_secs: 1,
        };
        assert_eq!(point.to_line(), r"lag\ data,group=a\,b\ c\=d value=-3i 1");
    }
}
