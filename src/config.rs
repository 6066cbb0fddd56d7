//! Configuration for a rig source
//!
//! Loaded from a JSON file, every field has a default so an empty
//! object `{}` is a valid configuration.

use crate::error::{Error, Result};
use crate::timing::FrameRate;
use log::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 55535;

pub const DEFAULT_ENDPOINT: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT);

/// Multicast group the rig is usually configured to send to
pub const MULTICAST_EXAMPLE_ENDPOINT: &str = "239.255.1.2:24680";

/// Camera pose and camera target subjects for the standard rig layout
pub const DEFAULT_SCHEMA: &str = r#"{ "sources": [
    {
        "subject": "robot_camera",
        "properties": ["Roll", "Focus", "Zoom"],
        "propertyIndex": [6, 7, 8],
        "bones": [
            { "name": "top", "parent": "", "index": [-1, -1, -1, -1, -1, -1] },
            { "name": "CameraPose", "parent": "top", "index": [0, 1, 2, 3, 4, 5] }
        ]
    },
    {
        "subject": "camera_target",
        "properties": ["CameraTarget_xt", "CameraTarget_yt", "CameraTarget_zt"],
        "propertyIndex": [9, 10, 11],
        "bones": [
            { "name": "top", "parent": "", "index": [-1, -1, -1, -1, -1, -1] },
            { "name": "CameraTarget", "parent": "top", "index": [9, 10, 11, -1, -1, -1] }
        ]
    }
] }"#;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// `address:port`, a multicast address joins that group
    ///
    /// Examples:
    /// - `0.0.0.0:55535` - unicast on all interfaces
    /// - `239.255.1.2:24680` - multicast group
    pub endpoint: String,
    pub source_name: String,
    /// Timecode rate of the consumer, also the output frame cap
    pub frame_rate: FrameRate,
    /// Subject schema file, the built-in schema is used when unset
    pub schema_path: Option<PathBuf>,
    /// Datagrams queued between the network thread and the pipeline
    pub channel_capacity: usize,
    pub log_level: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            source_name: "MRMC Rig".to_string(),
            frame_rate: FrameRate::default(),
            schema_path: None,
            channel_capacity: 1024,
            log_level: "info".to_string(),
        }
    }
}

impl SourceConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config: SourceConfig = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_rate.numerator == 0 || self.frame_rate.denominator == 0 {
            return Err(Error::Config(format!(
                "frame rate must be positive, got {}/{}",
                self.frame_rate.numerator, self.frame_rate.denominator
            )));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be at least 1".into()));
        }
        Ok(())
    }

    pub fn endpoint(&self) -> SocketAddrV4 {
        parse_endpoint(&self.endpoint)
    }

    /// Contents of the configured schema file, or the built-in schema
    pub fn schema_text(&self) -> Result<String> {
        match &self.schema_path {
            Some(path) => Ok(fs::read_to_string(path)?),
            None => Ok(DEFAULT_SCHEMA.to_string()),
        }
    }
}

/// Parse `address:port`, falling back to `0.0.0.0:55535`
pub fn parse_endpoint(text: &str) -> SocketAddrV4 {
    match text.trim().parse::<SocketAddrV4>() {
        Ok(endpoint) => endpoint,
        Err(_) => {
            warn!(
                "Could not parse endpoint {:?}, using {} (multicast example: {})",
                text, DEFAULT_ENDPOINT, MULTICAST_EXAMPLE_ENDPOINT
            );
            DEFAULT_ENDPOINT
        }
    }
}
