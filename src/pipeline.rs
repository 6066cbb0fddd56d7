//! Decode, gate, transform and emit.
//!
//! Runs on its own thread and is the only owner of the subject registry and
//! rate gate, so neither needs locking.

use crate::client::{LinkClient, SourceHandle};
use crate::data::RawFrame;
use crate::emitter;
use crate::receiver::Datagram;
use crate::subjects::SubjectRegistry;
use crate::timing::{now_seconds, FrameRate, RateGate};
use crate::transform::transform;
use log::*;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;

#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    overflow_dropped: AtomicU64,
    short_dropped: AtomicU64,
    rate_skipped: AtomicU64,
    frames_emitted: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub received: u64,
    pub overflow_dropped: u64,
    pub short_dropped: u64,
    pub rate_skipped: u64,
    pub frames_emitted: u64,
}

impl PipelineStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overflow(&self) {
        self.overflow_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            overflow_dropped: self.overflow_dropped.load(Ordering::Relaxed),
            short_dropped: self.short_dropped.load(Ordering::Relaxed),
            rate_skipped: self.rate_skipped.load(Ordering::Relaxed),
            frames_emitted: self.frames_emitted.load(Ordering::Relaxed),
        }
    }
}

pub struct FramePipeline {
    client: Arc<dyn LinkClient>,
    source: SourceHandle,
    registry: SubjectRegistry,
    gate: RateGate,
    stats: Arc<PipelineStats>,
}

impl FramePipeline {
    pub fn new(
        client: Arc<dyn LinkClient>,
        source: SourceHandle,
        schema_text: impl Into<String>,
        frame_rate: FrameRate,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            client,
            source,
            registry: SubjectRegistry::new(schema_text),
            gate: RateGate::new(frame_rate),
            stats,
        }
    }

    pub fn registry(&self) -> &SubjectRegistry {
        &self.registry
    }

    pub fn handle_received_data(&mut self, data: &[u8]) -> usize {
        self.handle_received_data_at(data, now_seconds())
    }

    /// Process one datagram received at `now` (wall clock seconds), returns frames sent
    pub fn handle_received_data_at(&mut self, data: &[u8], now: f64) -> usize {
        self.registry.ensure_setup(self.client.as_ref(), self.source);

        let frame = match RawFrame::decode(data) {
            Some(frame) => frame,
            None => {
                trace!("Dropping {} byte datagram", data.len());
                self.stats.short_dropped.fetch_add(1, Ordering::Relaxed);
                return 0;
            }
        };
        let scene_time = match self.gate.admit(now) {
            Some(scene_time) => scene_time,
            None => {
                trace!("Rate gated sample at {:.4}", now);
                self.stats.rate_skipped.fetch_add(1, Ordering::Relaxed);
                return 0;
            }
        };
        trace!("Rig focus {} (replaced by target distance)", frame.focus);

        let values = transform(&frame);
        let sent = emitter::emit(
            self.client.as_ref(),
            self.source,
            self.registry.subjects(),
            &values,
            now,
            scene_time,
        );
        self.stats
            .frames_emitted
            .fetch_add(sent as u64, Ordering::Relaxed);
        sent
    }

    /// Consume datagrams in arrival order until the queue closes or `stopping` is set
    pub fn run(mut self, mut receiver: Receiver<Datagram>, stopping: Arc<AtomicBool>) {
        info!("Frame pipeline started at {}", self.gate.rate());
        while let Some(datagram) = receiver.blocking_recv() {
            if stopping.load(Ordering::Acquire) {
                break;
            }
            self.handle_received_data(&datagram);
        }
        info!("Frame pipeline stopped");
    }
}
