use serde::{Deserialize, Serialize};

/// Identity of a connected eye tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerInfo {
    pub model: String,
    pub serial_number: String,
    pub address: String,
}

/// One eye's gaze point on the display area, in normalized coordinates.
///
/// Coordinates may be NaN when `valid` is false; consumers must not assume
/// finite positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeGaze {
    pub x: f32,
    pub y: f32,
    pub valid: bool,
}

impl EyeGaze {
    pub fn valid(x: f32, y: f32) -> Self {
        Self { x, y, valid: true }
    }

    pub fn invalid() -> Self {
        Self {
            x: f32::NAN,
            y: f32::NAN,
            valid: false,
        }
    }
}

/// A single raw gaze reading.
///
/// `system_time_us` is the device clock in microseconds; the epoch is
/// device-defined, the clock is monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    pub system_time_us: i64,
    pub left: EyeGaze,
    pub right: EyeGaze,
}

/// Streams the sample store can buffer.
///
/// Only gaze is wired up today; the enum keeps the store's API keyed by
/// stream the way the underlying engine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Gaze,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_eye_has_nan_position() {
        let eye = EyeGaze::invalid();
        assert!(!eye.valid);
        assert!(eye.x.is_nan());
        assert!(eye.y.is_nan());
    }
}
