//! Downstream consumer interface
//!
//! A [`LinkClient`] receives one static schema per subject followed by
//! frame data for that subject. Frame data refers to bones and properties
//! by position, so the order in [`StaticSchema`] is the order of
//! [`SubjectFrame::transforms`] and [`SubjectFrame::property_values`].

use crate::timing::SceneTime;
use log::*;
use nalgebra as na;
use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Identity of a registered source, assigned by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SourceHandle(pub u64);

/// Topology of one subject
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticSchema {
    pub subject: String,
    pub bone_names: Vec<String>,
    /// Index of each bone's parent, `None` for roots
    pub bone_parents: Vec<Option<usize>>,
    pub property_names: Vec<String>,
}

/// Pose and property values of one subject for one accepted sample
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectFrame {
    pub subject: String,
    pub world_time: f64,
    pub scene_time: SceneTime,
    pub transforms: Vec<na::Isometry3<f32>>,
    pub property_values: Vec<f32>,
}

pub trait LinkClient: Send + Sync {
    fn register_source(&self, name: &str) -> SourceHandle;
    fn remove_subject(&self, source: SourceHandle, subject: &str);
    /// Must precede any frame for `schema.subject`
    fn publish_static_schema(&self, source: SourceHandle, schema: StaticSchema);
    fn publish_frame(&self, source: SourceHandle, frame: SubjectFrame);
}

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

fn next_handle() -> SourceHandle {
    SourceHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
}

/// Logs everything it receives
#[derive(Debug, Default)]
pub struct LogClient;

impl LinkClient for LogClient {
    fn register_source(&self, name: &str) -> SourceHandle {
        let handle = next_handle();
        info!("Registered source {} as {:?}", name, handle);
        handle
    }

    fn remove_subject(&self, source: SourceHandle, subject: &str) {
        debug!("{:?}: removing subject {}", source, subject);
    }

    fn publish_static_schema(&self, source: SourceHandle, schema: StaticSchema) {
        info!(
            "{:?}: subject {} bones {:?} parents {:?} properties {:?}",
            source, schema.subject, schema.bone_names, schema.bone_parents, schema.property_names
        );
    }

    fn publish_frame(&self, source: SourceHandle, frame: SubjectFrame) {
        debug!(
            "{:?}: {} [{}] {} transforms, properties {:?}",
            source,
            frame.subject,
            frame.scene_time.timecode,
            frame.transforms.len(),
            frame.property_values
        );
    }
}

#[derive(Serialize)]
struct TransformRecord {
    translation: [f32; 3],
    /// i, j, k, w
    rotation: [f32; 4],
}

impl From<&na::Isometry3<f32>> for TransformRecord {
    fn from(transform: &na::Isometry3<f32>) -> Self {
        let t = transform.translation.vector;
        let q = transform.rotation.quaternion();
        Self {
            translation: [t.x, t.y, t.z],
            rotation: [q.i, q.j, q.k, q.w],
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Record<'a> {
    Schema {
        source: SourceHandle,
        #[serde(flatten)]
        schema: &'a StaticSchema,
    },
    Frame {
        source: SourceHandle,
        subject: &'a str,
        world_time: f64,
        timecode: String,
        scene_time: &'a SceneTime,
        transforms: Vec<TransformRecord>,
        properties: &'a [f32],
    },
}

/// Writes schemas and frames as newline delimited JSON
pub struct JsonLinesClient<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesClient<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn write_record(&self, record: &Record) {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let result = serde_json::to_writer(&mut *writer, record)
            .map_err(std::io::Error::from)
            .and_then(|_| writer.write_all(b"\n"))
            .and_then(|_| writer.flush());
        if let Err(error) = result {
            warn!("Failed to write record: {}", error);
        }
    }
}

impl<W: Write + Send> LinkClient for JsonLinesClient<W> {
    fn register_source(&self, name: &str) -> SourceHandle {
        let handle = next_handle();
        info!("Registered source {} as {:?}", name, handle);
        handle
    }

    fn remove_subject(&self, _source: SourceHandle, _subject: &str) {}

    fn publish_static_schema(&self, source: SourceHandle, schema: StaticSchema) {
        self.write_record(&Record::Schema {
            source,
            schema: &schema,
        });
    }

    fn publish_frame(&self, source: SourceHandle, frame: SubjectFrame) {
        self.write_record(&Record::Frame {
            source,
            subject: &frame.subject,
            world_time: frame.world_time,
            timecode: frame.scene_time.timecode.to_string(),
            scene_time: &frame.scene_time,
            transforms: frame.transforms.iter().map(TransformRecord::from).collect(),
            properties: &frame.property_values,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::FrameRate;

    #[test]
    fn json_lines_output() {
        let client = JsonLinesClient::new(Vec::new());
        let handle = client.register_source("test");
        client.publish_static_schema(
            handle,
            StaticSchema {
                subject: "robot_camera".into(),
                bone_names: vec!["top".into(), "CameraPose".into()],
                bone_parents: vec![None, Some(0)],
                property_names: vec!["Zoom".into()],
            },
        );
        client.publish_frame(
            handle,
            SubjectFrame {
                subject: "robot_camera".into(),
                world_time: 10.0,
                scene_time: SceneTime::at(10.0, FrameRate::new(30, 1)),
                transforms: vec![
                    na::Isometry3::identity(),
                    na::Isometry3::translation(1.0, 2.0, 3.0),
                ],
                property_values: vec![50.0],
            },
        );

        let output = String::from_utf8(client.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "schema");
        assert_eq!(lines[0]["bone_parents"], serde_json::json!([null, 0]));
        assert_eq!(lines[1]["type"], "frame");
        assert_eq!(lines[1]["timecode"], "00:00:10:00");
        assert_eq!(
            lines[1]["transforms"][1]["translation"],
            serde_json::json!([1.0, 2.0, 3.0])
        );
        assert_eq!(
            lines[1]["transforms"][0]["rotation"],
            serde_json::json!([0.0, 0.0, 0.0, 1.0])
        );
        assert_eq!(lines[1]["properties"], serde_json::json!([50.0]));
    }
}
