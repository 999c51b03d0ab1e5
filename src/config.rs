use std::env;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::MonitorError;
use crate::utils::utils_duration::{duration_or, parse_duration};

pub const DEFAULT_ZOOKEEPER: &str = "127.0.0.1:2181";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
// librdkafka accepts socket.timeout.ms in 10..=300000.
const KAFKA_TIMEOUT_MIN: Duration = Duration::from_millis(10);
const KAFKA_TIMEOUT_MAX: Duration = Duration::from_secs(300);

// --- PROCESS ENVIRONMENT ---

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub config_path: String,
    pub log_level: String,
}

impl EnvConfig {
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        Self {
            config_path: get_env("OFFSET_MONITOR_CONFIG", "./config.json"),
            log_level:   get_env("OFFSET_MONITOR_LOG", "info"),
        }
    }
}

// --- CONFIG AGGREGATOR ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub http_server: HttpServerConfig,
    pub session: SessionSettings,
    #[serde(rename = "influxdbSyncers")]
    pub influxdb_syncers: Vec<InfluxdbSyncerConfig>,
}

impl MonitorConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::ConfigurationFailure(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, MonitorError> {
        let config: MonitorConfig = serde_json::from_str(raw)
            .map_err(|e| MonitorError::ConfigurationFailure(format!("malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), MonitorError> {
        self.http_server.validate()?;
        self.session.resolve()?;
        Ok(())
    }
}

// HTTP SERVER
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpServerConfig {
    pub listen: String,
    pub latest_offset_pattern: String,
    pub consumer_group_offset_pattern: String,
    pub consumer_group_distance_pattern: String,
    pub callback_parentheses: bool,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen:                         ":8100".to_string(),
            latest_offset_pattern:          "/latest_offset".to_string(),
            consumer_group_offset_pattern:  "/consumer_group_offset".to_string(),
            consumer_group_distance_pattern: "/consumer_group_distance".to_string(),
            callback_parentheses:           false,
        }
    }
}

impl HttpServerConfig {
    /// Bind address; a Go-style ":port" listens on every interface.
    pub fn bind_addr(&self) -> String {
        let listen = or_default(&self.listen, ":8100");
        if listen.starts_with(':') {
            format!("0.0.0.0{}", listen)
        } else {
            listen.to_string()
        }
    }

    pub fn latest_offset_route(&self) -> &str {
        or_default(&self.latest_offset_pattern, "/latest_offset")
    }

    pub fn consumer_group_offset_route(&self) -> &str {
        or_default(&self.consumer_group_offset_pattern, "/consumer_group_offset")
    }

    pub fn consumer_group_distance_route(&self) -> &str {
        or_default(&self.consumer_group_distance_pattern, "/consumer_group_distance")
    }

    fn validate(&self) -> Result<(), MonitorError> {
        let routes = [
            self.latest_offset_route(),
            self.consumer_group_offset_route(),
            self.consumer_group_distance_route(),
        ];
        for route in routes {
            if !route.starts_with('/') {
                return Err(MonitorError::ConfigurationFailure(format!(
                    "route pattern '{}' must start with '/'",
                    route
                )));
            }
            // Path captures would make axum panic while building the router.
            if route.contains(['{', '}']) || route.split('/').any(|seg| seg.starts_with(':') || seg.starts_with('*')) {
                return Err(MonitorError::ConfigurationFailure(format!(
                    "route pattern '{}' must be a literal path",
                    route
                )));
            }
        }
        if routes[0] == routes[1] || routes[0] == routes[2] || routes[1] == routes[2] {
            return Err(MonitorError::ConfigurationFailure(
                "route patterns must be distinct".to_string(),
            ));
        }
        Ok(())
    }
}

// CLUSTER SESSION
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionSettings {
    pub zookeeper_timeout: String,
    pub kafka_timeout: String,
    pub client_id: String,
}

impl SessionSettings {
    pub fn resolve(&self) -> Result<SessionConfig, MonitorError> {
        Ok(SessionConfig {
            zookeeper_timeout: strict_duration("zookeeperTimeout", &self.zookeeper_timeout)?,
            kafka_timeout:     kafka_timeout(&self.kafka_timeout)?,
            client_id:         or_default(&self.client_id, "kafka-offset-monitor").to_string(),
        })
    }
}

/// Resolved connection settings handed to every `ClusterSession`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub zookeeper_timeout: Duration,
    pub kafka_timeout: Duration,
    pub client_id: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            zookeeper_timeout: DEFAULT_TIMEOUT,
            kafka_timeout:     DEFAULT_TIMEOUT,
            client_id:         "kafka-offset-monitor".to_string(),
        }
    }
}

// INFLUXDB SYNCER
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InfluxdbSyncerConfig {
    pub zookeeper: String,
    pub influxdb_host: String,
    pub influxdb_user: String,
    pub influxdb_password: String,
    pub influxdb_db: String,
    pub influxdb_retention_policy: String,
    pub influxdb_measurement_latest_offset: String,
    #[serde(alias = "influxdbMeasurementConsumerGroupOffset")]
    pub influxdb_measurement_consumer_group_distance: String,
    pub influxdb_timeout: String,
    pub interval: String,
}

impl InfluxdbSyncerConfig {
    /// Fills every blank field with its default. The interval never fails:
    /// anything unparseable falls back to five seconds.
    pub fn resolve(&self) -> PublisherConfig {
        PublisherConfig {
            zookeeper:          zookeeper_or_default(&self.zookeeper),
            host:               or_default(&self.influxdb_host, "http://127.0.0.1:8086").to_string(),
            user:               or_default(&self.influxdb_user, "root").to_string(),
            password:           or_default(&self.influxdb_password, "root").to_string(),
            database:           or_default(&self.influxdb_db, "kafka_monitor").to_string(),
            retention_policy:   or_default(&self.influxdb_retention_policy, "default").to_string(),
            latest_offset_measurement: or_default(&self.influxdb_measurement_latest_offset, "latest_offset").to_string(),
            distance_measurement: or_default(&self.influxdb_measurement_consumer_group_distance, "consumer_group_distance").to_string(),
            write_timeout:      duration_or(&self.influxdb_timeout, DEFAULT_TIMEOUT),
            interval:           duration_or(&self.interval, DEFAULT_INTERVAL),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub zookeeper: String,
    pub host: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub retention_policy: String,
    pub latest_offset_measurement: String,
    pub distance_measurement: String,
    pub write_timeout: Duration,
    pub interval: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        InfluxdbSyncerConfig::default().resolve()
    }
}

pub fn zookeeper_or_default(address: &str) -> String {
    or_default(address, DEFAULT_ZOOKEEPER).to_string()
}

// --- PRIVATE HELPERS ---

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() { default } else { value.trim() }
}

fn strict_duration(key: &str, raw: &str) -> Result<Duration, MonitorError> {
    match parse_duration(raw) {
        None => Ok(DEFAULT_TIMEOUT),
        Some(Ok(d)) if !d.is_zero() => Ok(d),
        Some(Ok(_)) => Err(MonitorError::ConfigurationFailure(format!("{} must be positive", key))),
        Some(Err(e)) => Err(MonitorError::ConfigurationFailure(format!("{} '{}': {}", key, raw, e))),
    }
}

fn kafka_timeout(raw: &str) -> Result<Duration, MonitorError> {
    let timeout = strict_duration("kafkaTimeout", raw)?;
    if !(KAFKA_TIMEOUT_MIN..=KAFKA_TIMEOUT_MAX).contains(&timeout) {
        return Err(MonitorError::ConfigurationFailure(format!(
            "kafkaTimeout '{}' must be between {:?} and {:?}",
            raw, KAFKA_TIMEOUT_MIN, KAFKA_TIMEOUT_MAX
        )));
    }
    Ok(timeout)
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
