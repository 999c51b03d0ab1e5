//! InfluxDB 1.x sink over the HTTP `/write` endpoint.

use std::future::Future;

use reqwest::{Client, Url};
use tracing::debug;

use crate::config::PublisherConfig;
use crate::error::MonitorError;
use crate::publisher::point::Point;

/// Destination for published points.
pub trait PointSink: Send + Sync {
    fn write_points(&self, points: Vec<Point>) -> impl Future<Output = Result<(), MonitorError>> + Send;
}

pub struct InfluxSink {
    client: Client,
    write_url: Url,
    user: String,
    password: String,
    database: String,
    retention_policy: String,
}

impl InfluxSink {
    pub fn open(config: &PublisherConfig) -> Result<Self, MonitorError> {
        let base = Url::parse(&config.host)
            .map_err(|e| MonitorError::connection(&config.host, format!("invalid influxdb url: {}", e)))?;
        let write_url = base
            .join("write")
            .map_err(|e| MonitorError::connection(&config.host, e))?;
        let client = Client::builder()
            .timeout(config.write_timeout)
            .user_agent("kafka-offset-monitor")
            .build()
            .map_err(|e| MonitorError::connection(&config.host, e))?;

        Ok(Self {
            client,
            write_url,
            user: config.user.clone(),
            password: config.password.clone(),
            database: config.database.clone(),
            retention_policy: config.retention_policy.clone(),
        })
    }
}

impl PointSink for InfluxSink {
    async fn write_points(&self, points: Vec<Point>) -> Result<(), MonitorError> {
        if points.is_empty() {
            return Ok(());
        }
        let count = points.len();
        let body = points.iter().map(Point::to_line).collect::<Vec<_>>().join("\n");

        let response = self
            .client
            .post(self.write_url.clone())
            .query(&[
                ("db", self.database.as_str()),
                ("rp", self.retention_policy.as_str()),
                ("precision", "s"),
            ])
            .basic_auth(&self.user, Some(&self.password))
            .body(body)
            .send()
            .await
            .map_err(|e| MonitorError::SinkFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MonitorError::SinkFailure(format!("{}: {}", status, text.trim())));
        }
        debug!("[InfluxSink] Wrote {} points to {}", count, self.database);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_url_keeps_base_path() {
        let config = PublisherConfig {
            host: "http://influx.local:8086/".to_string(),
            ..PublisherConfig::default()
        };
        let sink = InfluxSink::open(&config).unwrap();
        assert_eq!(sink.write_url.as_str(), "http://influx.local:8086/write");
    }

    #[test]
    fn rejects_unparseable_host() {
        let config = PublisherConfig {
            host: "not a url".to_string(),
            ..PublisherConfig::default()
        };
        assert!(matches!(InfluxSink::open(&config), Err(MonitorError::ConnectionFailure { .. })));
    }
}
