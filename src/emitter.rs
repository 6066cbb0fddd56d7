use crate::client::{LinkClient, SourceHandle, SubjectFrame};
use crate::data::ComputedValues;
use crate::subjects::Subject;
use crate::timing::SceneTime;
use nalgebra as na;

fn lookup3(values: &ComputedValues, index: [i32; 3]) -> Option<[f32; 3]> {
    Some([
        values.get(index[0])?,
        values.get(index[1])?,
        values.get(index[2])?,
    ])
}

/// Location and orientation of a bone.
///
/// A translation or rotation channel with any absent index leaves the origin or
/// identity in place. Rotation values are Euler degrees (roll, tilt, pan) with
/// positive tilt pitching the bone's +X axis up towards +Z, so a camera bone
/// built from slots 3..6 faces its target.
pub fn bone_transform(
    translation_index: [i32; 3],
    rotation_index: [i32; 3],
    values: &ComputedValues,
) -> na::Isometry3<f32> {
    let translation = match lookup3(values, translation_index) {
        Some([x, y, z]) => na::Translation3::new(x, y, z),
        None => na::Translation3::identity(),
    };
    let rotation = match lookup3(values, rotation_index) {
        // nalgebra pitches +X towards -Z for a positive Y angle
        Some([roll, tilt, pan]) => na::UnitQuaternion::from_euler_angles(
            roll.to_radians(),
            -tilt.to_radians(),
            pan.to_radians(),
        ),
        None => na::UnitQuaternion::identity(),
    };
    na::Isometry3::from_parts(translation, rotation)
}

pub fn build_frame(
    subject: &Subject,
    values: &ComputedValues,
    world_time: f64,
    scene_time: SceneTime,
) -> SubjectFrame {
    let transforms = subject
        .bones
        .iter()
        .map(|bone| bone_transform(bone.translation_index(), bone.rotation_index(), values))
        .collect();
    let property_values = subject
        .properties
        .iter()
        .filter_map(|property| values.get(property.index))
        .collect();
    SubjectFrame {
        subject: subject.name.clone(),
        world_time,
        scene_time,
        transforms,
        property_values,
    }
}

/// Push one frame per subject, returns the number of frames sent
pub fn emit(
    client: &dyn LinkClient,
    source: SourceHandle,
    subjects: &[Subject],
    values: &ComputedValues,
    world_time: f64,
    scene_time: SceneTime,
) -> usize {
    for subject in subjects {
        client.publish_frame(source, build_frame(subject, values, world_time, scene_time));
    }
    subjects.len()
}
