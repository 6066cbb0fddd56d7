//! Live link for motion-control camera rigs
//!
//! Receives fixed-layout UDP telemetry from the rig, converts camera and
//! target positions into pan / tilt / roll poses and forwards them, per
//! subject, to a [`client::LinkClient`] at a capped frame rate.

pub mod client;
pub mod config;
pub mod data;
pub mod emitter;
pub mod error;
pub mod pipeline;
pub mod receiver;
pub mod source;
pub mod subjects;
pub mod timing;
pub mod transform;

pub use client::{JsonLinesClient, LinkClient, LogClient};
pub use config::SourceConfig;
pub use error::{Error, Result};
pub use source::{ConnectionStatus, RigSource};
