pub mod linalg;

pub use linalg::*;

use serde::{Deserialize, Serialize};

use crate::error::FrameResult;

/// Instantaneous location reading consumed by the frame tracker.
///
/// `course` is degrees clockwise from true north; a negative value means the
/// heading is unknown.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub speed: f64,
    pub course: f64,
}

impl LocationFix {
    pub fn new(speed: f64, course: f64) -> Self {
        Self { speed, course }
    }

    /// Fix with no usable heading
    pub fn unknown_heading(speed: f64) -> Self {
        Self { speed, course: -1.0 }
    }

    pub fn has_heading(&self) -> bool {
        self.course >= 0.0
    }
}

/// One vehicle-frame telemetry sample.
///
/// The timestamp is implied by the sample's position in the buffer times the
/// sampling interval.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub speed: f64,
}

impl TelemetrySample {
    pub fn new(accel_x: f64, accel_y: f64, accel_z: f64, speed: f64) -> Self {
        Self {
            accel_x,
            accel_y,
            accel_z,
            speed,
        }
    }

    pub fn from_vector(accel: &Vec3, speed: f64) -> Self {
        Self::new(accel.x, accel.y, accel.z, speed)
    }

    /// Sentinel returned when popping an empty telemetry buffer
    pub fn invalid() -> Self {
        Self::new(f64::NAN, f64::NAN, f64::NAN, f64::NAN)
    }

    pub fn is_valid(&self) -> bool {
        self.accel_x.is_finite()
            && self.accel_y.is_finite()
            && self.accel_z.is_finite()
            && self.speed.is_finite()
    }

    pub fn accel(&self) -> Vec3 {
        Vec3::new(self.accel_x, self.accel_y, self.accel_z)
    }
}

/// Full sensor snapshot as recorded by the phone.
///
/// Angles are radians, speed m/s, course and heading degrees from true north.
/// Gravity is expressed in the device frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorRecord {
    pub longitude: f64,
    pub latitude: f64,
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub rot_rate_x: f64,
    pub rot_rate_y: f64,
    pub rot_rate_z: f64,
    pub gravity_x: f64,
    pub gravity_y: f64,
    pub gravity_z: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub speed: f64,
    pub heading: f64,
    pub course: f64,
    pub altitude: f64,
    pub horizontal_accuracy: f64,
    pub vertical_accuracy: f64,
    pub floor: f64,
}

impl SensorRecord {
    pub fn to_json(&self) -> FrameResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> FrameResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn accel(&self) -> Vec3 {
        Vec3::new(self.accel_x, self.accel_y, self.accel_z)
    }

    pub fn location_fix(&self) -> LocationFix {
        LocationFix::new(self.speed, self.course)
    }
}
