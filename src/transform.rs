use crate::data::{slot, ComputedValues, RawFrame, COMPUTED_VALUE_COUNT};
use nalgebra as na;

pub const METERS_TO_CENTIMETERS: f32 = 100.0;

/// Convert a decoded rig sample into the flat value layout used by subject schemas.
///
/// Pan is the bearing of the camera-to-target vector in the horizontal plane,
/// tilt its elevation above that plane. A zero length look-at vector yields 0° for both.
pub fn transform(frame: &RawFrame) -> ComputedValues {
    let pose = na::Vector3::new(frame.xv, frame.yv, frame.zv) * METERS_TO_CENTIMETERS;
    let target = na::Vector3::new(frame.xt, frame.yt, frame.zt) * METERS_TO_CENTIMETERS;
    let look_at = target - pose;

    let pan = look_at.y.atan2(look_at.x).to_degrees();
    let horizontal_distance = look_at.xy().norm();
    let tilt = look_at.z.atan2(horizontal_distance).to_degrees();
    let roll = -frame.roll;

    let mut values = [0_f32; COMPUTED_VALUE_COUNT];
    values[slot::POSE_X] = pose.x;
    values[slot::POSE_Y] = pose.y;
    values[slot::POSE_Z] = pose.z;
    // roll is x rotation, tilt y and pan z
    values[slot::ROLL] = roll;
    values[slot::TILT] = tilt;
    values[slot::PAN] = pan;
    values[slot::RAW_ROLL] = frame.roll;
    // the rig's own focus distance is unreliable
    values[slot::TARGET_DISTANCE] = look_at.norm();
    values[slot::ZOOM] = frame.zoom;
    values[slot::TARGET_X] = target.x;
    values[slot::TARGET_Y] = target.y;
    values[slot::TARGET_Z] = target.z;
    ComputedValues(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::encode_datagram;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-3,
            "expected {} got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_camera_sample() {
        let bytes = encode_datagram([1., 2., 3., 4., 5., 6., 10., 0., 50.]);
        let frame = RawFrame::decode(&bytes).unwrap();
        let values = transform(&frame);
        let v = values.as_slice();

        assert_eq!(&v[0..3], &[100., -200., 300.]);
        assert_eq!(&v[9..12], &[400., -500., 600.]);
        // look at = (300, -300, 300)
        assert_close(v[slot::PAN], -45.0);
        assert_close(v[slot::TILT], (300_f32).atan2(300. * 2_f32.sqrt()).to_degrees());
        assert_eq!(v[slot::ROLL], -10.);
        assert_eq!(v[slot::RAW_ROLL], 10.);
        assert_close(v[slot::TARGET_DISTANCE], (3. * 300_f32 * 300.).sqrt());
        assert_eq!(v[slot::ZOOM], 50.);
    }

    #[test]
    fn coincident_target_yields_zero_angles() {
        let frame = RawFrame {
            xv: 1.5,
            yv: -2.0,
            zv: 0.3,
            xt: 1.5,
            yt: -2.0,
            zt: 0.3,
            ..Default::default()
        };
        let values = transform(&frame);
        assert_eq!(values.0[slot::PAN], 0.0);
        assert_eq!(values.0[slot::TILT], 0.0);
        assert_eq!(values.0[slot::TARGET_DISTANCE], 0.0);
    }

    #[test]
    fn straight_up_is_ninety_degrees_tilt() {
        let frame = RawFrame {
            zt: 2.0,
            ..Default::default()
        };
        let values = transform(&frame);
        assert_close(values.0[slot::TILT], 90.0);
        assert_close(values.0[slot::TARGET_DISTANCE], 200.0);
    }

    #[test]
    fn transform_is_deterministic() {
        let frame = RawFrame {
            xv: 0.25,
            yv: 1.75,
            zv: -0.5,
            xt: 3.0,
            yt: -4.0,
            zt: 1.0,
            roll: -7.5,
            focus: 12.0,
            zoom: 0.8,
        };
        assert_eq!(transform(&frame), transform(&frame));
    }
}
