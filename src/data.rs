use byteorder::{ByteOrder, LittleEndian};

/// Number of floats in a rig datagram
pub const RIG_FIELD_COUNT: usize = 9;

/// Minimum payload size, anything shorter is dropped
pub const RIG_DATAGRAM_SIZE: usize = RIG_FIELD_COUNT * 4;

/// One sample as sent by the rig.
///
/// Positions are in meters, roll in degrees, focus and zoom in rig units.
/// After [`RawFrame::decode`] the Y axis is already flipped to the target convention.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawFrame {
    pub xv: f32,
    pub yv: f32,
    pub zv: f32,
    pub xt: f32,
    pub yt: f32,
    pub zt: f32,
    pub roll: f32,
    pub focus: f32,
    pub zoom: f32,
}

impl RawFrame {
    /// Decode the fixed little-endian layout.
    ///
    /// Returns `None` for payloads shorter than 36 bytes, trailing bytes are ignored.
    pub fn decode(data: &[u8]) -> Option<RawFrame> {
        if data.len() < RIG_DATAGRAM_SIZE {
            return None;
        }
        let mut fields = [0_f32; RIG_FIELD_COUNT];
        LittleEndian::read_f32_into(&data[..RIG_DATAGRAM_SIZE], &mut fields);
        let frame = RawFrame {
            xv: fields[0],
            yv: fields[1],
            zv: fields[2],
            xt: fields[3],
            yt: fields[4],
            zt: fields[5],
            roll: fields[6],
            focus: fields[7],
            zoom: fields[8],
        };
        Some(frame.flip_y())
    }

    /// Rig space to target space
    fn flip_y(mut self) -> Self {
        self.yv = -self.yv;
        self.yt = -self.yt;
        self
    }
}

/// Encode rig-space values (`xv, yv, zv, xt, yt, zt, roll, focus, zoom`) as a datagram
pub fn encode_datagram(fields: [f32; RIG_FIELD_COUNT]) -> Vec<u8> {
    let mut buffer = [0_u8; RIG_DATAGRAM_SIZE];
    LittleEndian::write_f32_into(&fields, &mut buffer);
    buffer.to_vec()
}

/// Slots of [`ComputedValues`]. Subject schemas index into these offsets.
pub mod slot {
    pub const POSE_X: usize = 0;
    pub const POSE_Y: usize = 1;
    pub const POSE_Z: usize = 2;
    pub const ROLL: usize = 3;
    pub const TILT: usize = 4;
    pub const PAN: usize = 5;
    pub const RAW_ROLL: usize = 6;
    pub const TARGET_DISTANCE: usize = 7;
    pub const ZOOM: usize = 8;
    pub const TARGET_X: usize = 9;
    pub const TARGET_Y: usize = 10;
    pub const TARGET_Z: usize = 11;
}

pub const COMPUTED_VALUE_COUNT: usize = 12;

/// Flat per-frame values that bones and properties reference by offset
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ComputedValues(pub [f32; COMPUTED_VALUE_COUNT]);

impl ComputedValues {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Value at `index`, `None` when negative or out of range
    pub fn get(&self, index: i32) -> Option<f32> {
        if index < 0 {
            return None;
        }
        self.0.get(index as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_datagram_is_dropped() {
        let bytes = encode_datagram([1.0; RIG_FIELD_COUNT]);
        for len in 0..RIG_DATAGRAM_SIZE {
            assert!(RawFrame::decode(&bytes[..len]).is_none(), "len {}", len);
        }
    }

    #[test]
    fn test_field_layout_and_y_flip() {
        let bytes = encode_datagram([1., 2., 3., 4., 5., 6., 10., 7., 50.]);
        let frame = RawFrame::decode(&bytes).unwrap();
        assert_eq!(frame.xv, 1.);
        assert_eq!(frame.yv, -2.);
        assert_eq!(frame.zv, 3.);
        assert_eq!(frame.xt, 4.);
        assert_eq!(frame.yt, -5.);
        assert_eq!(frame.zt, 6.);
        assert_eq!(frame.roll, 10.);
        assert_eq!(frame.focus, 7.);
        assert_eq!(frame.zoom, 50.);
    }

    #[test]
    fn encoded_datagram_is_little_endian() {
        let bytes = encode_datagram([1.0, 0., 0., 0., 0., 0., 0., 0., -2.0]);
        assert_eq!(bytes.len(), RIG_DATAGRAM_SIZE);
        assert_eq!(&bytes[..4], &[0x00, 0x00, 0x80, 0x3f]);
        assert_eq!(&bytes[32..], &[0x00, 0x00, 0x00, 0xc0]);
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = encode_datagram([0.5; RIG_FIELD_COUNT]);
        bytes.extend_from_slice(&[0xff; 12]);
        let frame = RawFrame::decode(&bytes).unwrap();
        assert_eq!(frame.zoom, 0.5);
        assert_eq!(frame.yt, -0.5);
    }

    #[test]
    fn computed_value_lookup_is_bounds_checked() {
        let values = ComputedValues([3.0; COMPUTED_VALUE_COUNT]);
        assert_eq!(values.get(-1), None);
        assert_eq!(values.get(11), Some(3.0));
        assert_eq!(values.get(12), None);
        assert_eq!(values.get(99), None);
    }
}
