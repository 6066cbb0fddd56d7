use crate::client::{LinkClient, SourceHandle};
use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::pipeline::{FramePipeline, PipelineStats, StatsSnapshot};
use crate::receiver::DatagramReceiver;
use log::*;
use std::fmt;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use tokio::sync::mpsc;

pub const SOURCE_TYPE: &str = "RMG MRMC LiveLink";
pub const MACHINE_NAME: &str = "localhost";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    DeviceNotFound,
    Receiving,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::DeviceNotFound => write!(f, "Device Not Found"),
            ConnectionStatus::Receiving => write!(f, "Receiving"),
        }
    }
}

/// A live connection to one rig.
///
/// Owns the network thread and the pipeline thread. Dropping the source stops
/// both and releases the socket.
pub struct RigSource {
    endpoint: SocketAddrV4,
    source: SourceHandle,
    stopping: Arc<AtomicBool>,
    stats: Arc<PipelineStats>,
    receiver: Option<DatagramReceiver>,
    pipeline_handle: Option<JoinHandle<()>>,
}

impl RigSource {
    /// Register with `client` and start receiving.
    ///
    /// Transport failures leave the source in [`ConnectionStatus::DeviceNotFound`],
    /// they are not retried.
    pub fn start(config: &SourceConfig, client: Arc<dyn LinkClient>) -> Self {
        let endpoint = config.endpoint();
        let source = client.register_source(&config.source_name);
        let schema_text = config.schema_text().unwrap_or_else(|error| {
            warn!("Could not read subject schema: {}", error);
            String::new()
        });
        let stopping = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(PipelineStats::default());
        let pipeline = FramePipeline::new(
            client,
            source,
            schema_text,
            config.frame_rate,
            stats.clone(),
        );

        let mut rig_source = Self {
            endpoint,
            source,
            stopping,
            stats,
            receiver: None,
            pipeline_handle: None,
        };
        if let Err(error) = rig_source.spawn(pipeline, config.channel_capacity) {
            error!("Could not start source on {}: {}", endpoint, error);
            rig_source.request_shutdown();
            rig_source.receiver = None;
        }
        info!("{} {}: {}", SOURCE_TYPE, endpoint, rig_source.status());
        rig_source
    }

    fn spawn(&mut self, pipeline: FramePipeline, channel_capacity: usize) -> Result<()> {
        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        let receiver =
            DatagramReceiver::start(self.endpoint, tx, self.stopping.clone(), self.stats.clone())?;
        self.receiver = Some(receiver);

        let stopping = self.stopping.clone();
        let pipeline_handle = thread::Builder::new()
            .name("rig-frame-pipeline".to_string())
            .spawn(move || pipeline.run(rx, stopping))
            .map_err(|e| Error::Thread(e.to_string()))?;
        self.pipeline_handle = Some(pipeline_handle);
        Ok(())
    }

    pub fn is_source_still_valid(&self) -> bool {
        let receiving = self
            .receiver
            .as_ref()
            .map_or(false, |receiver| receiver.is_running());
        let pipeline_alive = self
            .pipeline_handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished());
        !self.stopping.load(Ordering::Acquire) && receiving && pipeline_alive
    }

    /// Signal both threads to stop, safe to call more than once
    pub fn request_shutdown(&self) -> bool {
        self.stopping.store(true, Ordering::Release);
        true
    }

    /// Receiving for as long as the network thread holds the socket
    pub fn status(&self) -> ConnectionStatus {
        match &self.receiver {
            Some(receiver) if receiver.is_running() => ConnectionStatus::Receiving,
            _ => ConnectionStatus::DeviceNotFound,
        }
    }

    pub fn source_type(&self) -> &'static str {
        SOURCE_TYPE
    }

    pub fn machine_name(&self) -> &'static str {
        MACHINE_NAME
    }

    pub fn endpoint(&self) -> SocketAddrV4 {
        self.endpoint
    }

    pub fn source_handle(&self) -> SourceHandle {
        self.source
    }

    /// Bound address, useful when the configured port is 0
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.receiver.as_ref().map(DatagramReceiver::local_addr)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for RigSource {
    fn drop(&mut self) {
        self.request_shutdown();
        // joins the network thread, which closes the queue
        drop(self.receiver.take());
        if let Some(pipeline_handle) = self.pipeline_handle.take() {
            if pipeline_handle.join().is_err() {
                error!("Frame pipeline thread panicked");
            }
        }
        let stats = self.stats.snapshot();
        info!(
            "Source {} closed: {} received, {} queue drops, {} short, {} gated, {} frames sent",
            self.endpoint,
            stats.received,
            stats.overflow_dropped,
            stats.short_dropped,
            stats.rate_skipped,
            stats.frames_emitted
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LogClient;

    #[test]
    fn status_strings() {
        assert_eq!(ConnectionStatus::DeviceNotFound.to_string(), "Device Not Found");
        assert_eq!(ConnectionStatus::Receiving.to_string(), "Receiving");
    }

    #[test]
    fn unbindable_endpoint_is_device_not_found() {
        let config = SourceConfig {
            endpoint: "192.0.2.1:55535".to_string(),
            ..Default::default()
        };
        let source = RigSource::start(&config, Arc::new(LogClient));
        assert_eq!(source.status(), ConnectionStatus::DeviceNotFound);
        assert!(!source.is_source_still_valid());
        assert!(source.local_addr().is_none());
    }

    #[test]
    fn shutdown_invalidates_source() {
        let config = SourceConfig {
            endpoint: "127.0.0.1:0".to_string(),
            ..Default::default()
        };
        let source = RigSource::start(&config, Arc::new(LogClient));
        assert_eq!(source.status(), ConnectionStatus::Receiving);
        assert!(source.is_source_still_valid());
        assert!(source.request_shutdown());
        assert!(source.request_shutdown());
        assert!(!source.is_source_still_valid());
    }

    #[test]
    fn status_follows_network_thread() {
        let config = SourceConfig {
            endpoint: "127.0.0.1:0".to_string(),
            ..Default::default()
        };
        let source = RigSource::start(&config, Arc::new(LogClient));
        assert_eq!(source.status(), ConnectionStatus::Receiving);
        source.request_shutdown();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while source.status() == ConnectionStatus::Receiving && std::time::Instant::now() < deadline {
            thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(source.status(), ConnectionStatus::DeviceNotFound);
        assert!(!source.is_source_still_valid());
    }
}
