//! Scheduled Publisher: pushes watermark and lag views into the time-series
//! sink on a fixed interval.
//!
//! Lifecycle: Unconfigured -> Initialized -> Running -> Closed, one way only.
//! A publisher owns its cluster session; it never shares the query registry.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cluster::{ClusterSession, ClusterSource};
use crate::config::{PublisherConfig, SessionConfig};
use crate::error::MonitorError;
use crate::offsets::{compute_lag, compute_watermarks};
use crate::publisher::influx::{InfluxSink, PointSink};
use crate::publisher::point::{lag_points, watermark_points};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherState {
    Unconfigured,
    Initialized,
    Running,
    Closed,
}

pub struct Publisher<K: PointSink + 'static = InfluxSink> {
    config: PublisherConfig,
    state: PublisherState,
    job: Option<SyncJob<K>>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Publisher<InfluxSink> {
    /// Opens the publisher's own cluster session and the InfluxDB sink.
    pub async fn init(&mut self, session_config: SessionConfig) -> Result<(), MonitorError> {
        self.expect_state(PublisherState::Unconfigured)?;

        let address = self.config.zookeeper.clone();
        let session = tokio::task::spawn_blocking(move || ClusterSession::open(address, session_config)).await??;
        let sink = match InfluxSink::open(&self.config) {
            Ok(sink) => sink,
            Err(e) => {
                session.close();
                return Err(e);
            }
        };
        self.attach(Arc::new(session), sink)
    }
}

impl<K: PointSink + 'static> Publisher<K> {
    pub fn new(config: PublisherConfig) -> Self {
        Self {
            config,
            state: PublisherState::Unconfigured,
            job: None,
            shutdown: CancellationToken::new(),
            task: None,
        }
    }

    /// Moves to `Initialized` with an already-open source and sink.
    pub fn attach(&mut self, source: Arc<dyn ClusterSource>, sink: K) -> Result<(), MonitorError> {
        self.expect_state(PublisherState::Unconfigured)?;
        self.job = Some(SyncJob {
            source,
            sink: Arc::new(sink),
            latest_measurement: self.config.latest_offset_measurement.clone(),
            distance_measurement: self.config.distance_measurement.clone(),
        });
        self.state = PublisherState::Initialized;
        info!(
            "[Publisher] Initialized for {} (every {:?}, db {})",
            self.config.zookeeper, self.config.interval, self.config.database
        );
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), MonitorError> {
        self.expect_state(PublisherState::Initialized)?;
        let job = self.job.clone().ok_or(MonitorError::NotConnected)?;
        let shutdown = self.shutdown.clone();
        let period = self.config.interval;

        self.task = Some(tokio::spawn(run_loop(job, period, shutdown)));
        self.state = PublisherState::Running;
        Ok(())
    }

    /// Stops the timer, waits for an in-flight tick, closes the session.
    pub async fn close(&mut self) {
        if self.state == PublisherState::Closed {
            return;
        }
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("[Publisher] Loop for {} ended abnormally: {}", self.config.zookeeper, e);
            }
        }
        if let Some(job) = self.job.take() {
            job.source.close();
        }
        self.state = PublisherState::Closed;
        info!("[Publisher] Closed for {}", self.config.zookeeper);
    }

    pub fn state(&self) -> PublisherState {
        self.state
    }

    pub fn config(&self) -> &PublisherConfig {
        &self.config
    }

    /// Runs one publication cycle right now, outside the timer.
    pub async fn sync_now(&self) -> Result<(), MonitorError> {
        let job = self.job.as_ref().ok_or(MonitorError::NotConnected)?;
        job.sync_latest_offset().await?;
        job.sync_consumer_group_distance().await?;
        Ok(())
    }

    fn expect_state(&self, expected: PublisherState) -> Result<(), MonitorError> {
        if self.state != expected {
            return Err(MonitorError::ConfigurationFailure(format!(
                "publisher for {} is {:?}, expected {:?}",
                self.config.zookeeper, self.state, expected
            )));
        }
        Ok(())
    }
}

async fn run_loop<K: PointSink + 'static>(job: SyncJob<K>, period: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => job.run_tick().await,
        }
    }
    debug!("[Publisher] Loop for {} stopped", job.source.address());
}

/// What one tick needs; cheap to clone into the background task.
struct SyncJob<K> {
    source: Arc<dyn ClusterSource>,
    sink: Arc<K>,
    latest_measurement: String,
    distance_measurement: String,
}

impl<K> Clone for SyncJob<K> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            sink: self.sink.clone(),
            latest_measurement: self.latest_measurement.clone(),
            distance_measurement: self.distance_measurement.clone(),
        }
    }
}

impl<K: PointSink + 'static> SyncJob<K> {
    /// Both halves run even if the first fails; errors never end the loop.
    async fn run_tick(&self) {
        let address = self.source.address().to_string();
        debug!("[Publisher] Start sync for {}", address);
        if let Err(e) = self.sync_latest_offset().await {
            warn!("[Publisher] Latest offset sync for {} failed: {}", address, e);
        }
        if let Err(e) = self.sync_consumer_group_distance().await {
            warn!("[Publisher] Consumer group distance sync for {} failed: {}", address, e);
        }
        debug!("[Publisher] End sync for {}", address);
    }

    async fn sync_latest_offset(&self) -> Result<usize, MonitorError> {
        let source = self.source.clone();
        let view = tokio::task::spawn_blocking(move || compute_watermarks(source.as_ref())).await??;
        let points = watermark_points(&view, &self.latest_measurement, chrono::Utc::now().timestamp());
        let count = points.len();
        self.sink.write_points(points).await?;
        Ok(count)
    }

    async fn sync_consumer_group_distance(&self) -> Result<usize, MonitorError> {
        let source = self.source.clone();
        let view = tokio::task::spawn_blocking(move || compute_lag(source.as_ref())).await??;
        let points = lag_points(&view, &self.distance_measurement, chrono::Utc::now().timestamp());
        let count = points.len();
        self.sink.write_points(points).await?;
        Ok(count)
    }
}
