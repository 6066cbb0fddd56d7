//! Subject registry
//!
//! Maps the flat computed values onto named subjects. The mapping is a JSON
//! document of the form
//!
//! ```json
//! { "sources": [{
//!     "subject": "robot_camera",
//!     "properties": ["Zoom"],
//!     "propertyIndex": [8],
//!     "bones": [{ "name": "CameraPose", "parent": "", "index": [0, 1, 2, 3, 4, 5] }]
//! }] }
//! ```
//!
//! Bone `index` holds translation X/Y/Z then rotation X/Y/Z offsets, missing
//! entries default to -1 (channel absent).

use crate::client::{LinkClient, SourceHandle, StaticSchema};
use crate::error::Result;
use log::*;
use serde::Deserialize;

pub const BONE_CHANNELS: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent_name: String,
    pub index: [i32; BONE_CHANNELS],
    pub is_root: bool,
    pub id: usize,
}

impl Bone {
    pub fn translation_index(&self) -> [i32; 3] {
        [self.index[0], self.index[1], self.index[2]]
    }

    pub fn rotation_index(&self) -> [i32; 3] {
        [self.index[3], self.index[4], self.index[5]]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoneProperty {
    pub name: String,
    pub index: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    pub name: String,
    pub bones: Vec<Bone>,
    pub properties: Vec<BoneProperty>,
}

impl Subject {
    pub fn static_schema(&self) -> StaticSchema {
        StaticSchema {
            subject: self.name.clone(),
            bone_names: self.bones.iter().map(|bone| bone.name.clone()).collect(),
            bone_parents: self.bones.iter().map(|bone| self.parent_of(bone)).collect(),
            property_names: self
                .properties
                .iter()
                .map(|property| property.name.clone())
                .collect(),
        }
    }

    fn parent_of(&self, bone: &Bone) -> Option<usize> {
        if bone.is_root {
            return None;
        }
        let parent = self
            .bones
            .iter()
            .take(bone.id)
            .position(|candidate| candidate.name == bone.parent_name);
        if parent.is_none() {
            warn!(
                "Subject {}: bone {} has unknown parent {}, linking to bone 0",
                self.name, bone.name, bone.parent_name
            );
        }
        Some(parent.unwrap_or(0))
    }
}

#[derive(Deserialize, Debug)]
struct SchemaDocument {
    sources: Vec<SubjectDescription>,
}

#[derive(Deserialize, Debug)]
struct SubjectDescription {
    subject: String,
    #[serde(default)]
    properties: Vec<String>,
    #[serde(default, rename = "propertyIndex")]
    property_index: Vec<i32>,
    #[serde(default)]
    bones: Vec<BoneDescription>,
}

#[derive(Deserialize, Debug)]
struct BoneDescription {
    #[serde(default)]
    name: String,
    #[serde(default)]
    parent: String,
    #[serde(default)]
    index: Vec<i32>,
}

impl From<SubjectDescription> for Subject {
    fn from(description: SubjectDescription) -> Self {
        let bones = description
            .bones
            .into_iter()
            .enumerate()
            .map(|(id, bone)| {
                let mut index = [-1; BONE_CHANNELS];
                for (slot, value) in index.iter_mut().zip(bone.index) {
                    *slot = value;
                }
                Bone {
                    is_root: bone.parent.is_empty(),
                    name: bone.name,
                    parent_name: bone.parent,
                    index,
                    id,
                }
            })
            .collect();
        let properties = description
            .properties
            .into_iter()
            .enumerate()
            .map(|(i, name)| BoneProperty {
                name,
                index: description.property_index.get(i).copied().unwrap_or(-1),
            })
            .collect();
        Subject {
            name: description.subject,
            bones,
            properties,
        }
    }
}

/// Parse a subject schema, preserving declaration order
pub fn build_subjects(schema_text: &str) -> Result<Vec<Subject>> {
    let document: SchemaDocument = serde_json::from_str(schema_text)?;
    Ok(document.sources.into_iter().map(Subject::from).collect())
}

/// Owns the subjects of one connection.
///
/// Setup happens once, on the first datagram, and announces every subject's
/// static schema to the client before any frame is produced.
pub struct SubjectRegistry {
    schema_text: String,
    subjects: Vec<Subject>,
    needs_setup: bool,
}

impl SubjectRegistry {
    pub fn new(schema_text: impl Into<String>) -> Self {
        Self {
            schema_text: schema_text.into(),
            subjects: Vec::new(),
            needs_setup: true,
        }
    }

    pub fn needs_setup(&self) -> bool {
        self.needs_setup
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn ensure_setup(&mut self, client: &dyn LinkClient, source: SourceHandle) {
        if !self.needs_setup {
            return;
        }
        self.needs_setup = false;
        self.subjects = match build_subjects(&self.schema_text) {
            Ok(subjects) => subjects,
            Err(error) => {
                warn!("Ignoring subject schema, no frames will be sent: {}", error);
                Vec::new()
            }
        };
        for subject in &self.subjects {
            client.remove_subject(source, &subject.name);
            info!(
                "Registering subject {} ({} bones, {} properties)",
                subject.name,
                subject.bones.len(),
                subject.properties.len()
            );
            client.publish_static_schema(source, subject.static_schema());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SCHEMA;

    #[test]
    fn test_default_schema() {
        let subjects = build_subjects(DEFAULT_SCHEMA).unwrap();
        assert_eq!(subjects.len(), 2);

        let camera = &subjects[0];
        assert_eq!(camera.name, "robot_camera");
        assert_eq!(camera.bones.len(), 2);
        assert_eq!(camera.bones[0].name, "top");
        assert!(camera.bones[0].is_root);
        assert_eq!(camera.bones[1].name, "CameraPose");
        assert_eq!(camera.bones[1].parent_name, "top");
        assert!(!camera.bones[1].is_root);
        assert_eq!(camera.bones[1].id, 1);
        assert_eq!(camera.bones[1].index, [0, 1, 2, 3, 4, 5]);
        let names: Vec<&str> = camera.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["Roll", "Focus", "Zoom"]);
        let indices: Vec<i32> = camera.properties.iter().map(|p| p.index).collect();
        assert_eq!(indices, [6, 7, 8]);

        let target = &subjects[1];
        assert_eq!(target.name, "camera_target");
        assert_eq!(target.bones[1].index, [9, 10, 11, -1, -1, -1]);
    }

    #[test]
    fn missing_indices_default_to_absent() {
        let schema = r#"{ "sources": [{
            "subject": "cam",
            "properties": ["A", "B"],
            "propertyIndex": [4],
            "bones": [{ "name": "root", "index": [1, 2] }]
        }] }"#;
        let subjects = build_subjects(schema).unwrap();
        let subject = &subjects[0];
        assert_eq!(subject.bones[0].index, [1, 2, -1, -1, -1, -1]);
        assert!(subject.bones[0].is_root);
        assert_eq!(subject.properties[0].index, 4);
        assert_eq!(subject.properties[1].index, -1);
    }

    #[test]
    fn declared_order_is_preserved() {
        let subject_count = 4;
        let bone_count = 5;
        let property_count = 3;
        let sources: Vec<serde_json::Value> = (0..subject_count)
            .map(|s| {
                let bones: Vec<serde_json::Value> = (0..bone_count)
                    .map(|b| {
                        let parent = if b == 0 {
                            String::new()
                        } else {
                            format!("bone{}", b - 1)
                        };
                        serde_json::json!({ "name": format!("bone{}", b), "parent": parent, "index": [b] })
                    })
                    .collect();
                let properties: Vec<String> =
                    (0..property_count).map(|p| format!("prop{}", p)).collect();
                serde_json::json!({
                    "subject": format!("subject{}", s),
                    "properties": properties,
                    "propertyIndex": (0..property_count).collect::<Vec<i32>>(),
                    "bones": bones
                })
            })
            .collect();
        let schema = serde_json::json!({ "sources": sources }).to_string();

        let subjects = build_subjects(&schema).unwrap();
        assert_eq!(subjects.len(), subject_count);
        for (s, subject) in subjects.iter().enumerate() {
            assert_eq!(subject.name, format!("subject{}", s));
            assert_eq!(subject.bones.len(), bone_count);
            assert_eq!(subject.properties.len(), property_count as usize);
            for (b, bone) in subject.bones.iter().enumerate() {
                assert_eq!(bone.name, format!("bone{}", b));
                assert_eq!(bone.id, b);
            }
            let parents = subject.static_schema().bone_parents;
            assert_eq!(parents, vec![None, Some(0), Some(1), Some(2), Some(3)]);
        }
    }

    #[test]
    fn unknown_parent_links_to_first_bone() {
        let schema = r#"{ "sources": [{ "subject": "cam", "bones": [
            { "name": "a", "parent": "" },
            { "name": "b", "parent": "a" },
            { "name": "c", "parent": "missing" }
        ] }] }"#;
        let subjects = build_subjects(schema).unwrap();
        assert_eq!(
            subjects[0].static_schema().bone_parents,
            vec![None, Some(0), Some(0)]
        );
    }

    #[test]
    fn hand_built_bone_id_past_end_is_tolerated() {
        let bone = |name: &str, parent: &str, id: usize| Bone {
            name: name.to_string(),
            parent_name: parent.to_string(),
            index: [-1; BONE_CHANNELS],
            is_root: parent.is_empty(),
            id,
        };
        let subject = Subject {
            name: "cam".to_string(),
            bones: vec![bone("a", "", 0), bone("b", "a", 7)],
            properties: Vec::new(),
        };
        assert_eq!(subject.static_schema().bone_parents, vec![None, Some(0)]);
    }

    #[test]
    fn malformed_schema_is_an_error() {
        assert!(build_subjects("not json").is_err());
        assert!(build_subjects(r#"{ "subjects": [] }"#).is_err());
    }
}
