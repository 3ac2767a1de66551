//! Device / earth / vehicle reference frames.
//!
//! The device attitude (device → earth) comes straight from the motion sensor.
//! The vehicle frame is derived from GPS course, and only while the vehicle is
//! moving fast enough for the course to mean anything.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::rotation::RotationMatrix;
use crate::types::{LocationFix, Vec3};

/// 5 mph in m/s. Below this, parked / crawling GPS noise would spin the vehicle frame.
pub const DEFAULT_MOVING_THRESHOLD: f64 = 2.2452;

/// Supplies the device attitude (device → earth) once per tick
pub trait AttitudeSource {
    fn attitude(&mut self) -> RotationMatrix;
}

/// Supplies instantaneous speed and course
pub trait LocationSource {
    fn location(&mut self) -> LocationFix;
}

/// Supplies device-frame user acceleration
pub trait AccelerationSource {
    fn acceleration(&mut self) -> Vec3;
}

/// `course >= 0` and `speed > threshold`
pub fn is_moving_fast_enough(fix: &LocationFix, threshold: f64) -> bool {
    fix.has_heading() && fix.speed > threshold
}

/// Ground → vehicle rotation for a course in degrees clockwise from north.
///
/// Course grows clockwise while rotation about the vertical axis grows
/// counter-clockwise, hence the negated angle.
pub fn ground_to_vehicle(course_deg: f64) -> RotationMatrix {
    let theta = -course_deg / 180.0 * PI;
    RotationMatrix::rotate_z(theta)
}

/// Rotations produced by one tracker refresh
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameRotations {
    pub device_earth: RotationMatrix,
    pub device_vehicle: RotationMatrix,
    pub moving: bool,
}

impl FrameRotations {
    /// Pure per-tick computation. Every branch yields a valid matrix.
    pub fn compute(attitude: RotationMatrix, fix: &LocationFix, threshold: f64) -> Self {
        let moving = is_moving_fast_enough(fix, threshold);
        let device_vehicle = if moving {
            attitude * ground_to_vehicle(fix.course)
        } else {
            RotationMatrix::identity()
        };

        Self {
            device_earth: attitude,
            device_vehicle,
            moving,
        }
    }
}

impl Default for FrameRotations {
    fn default() -> Self {
        Self {
            device_earth: RotationMatrix::identity(),
            device_vehicle: RotationMatrix::identity(),
            moving: false,
        }
    }
}

/// Everything a refresh observed and produced
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameUpdate {
    pub rotations: FrameRotations,
    pub fix: LocationFix,
}

/// Serializable view of the current frames, for visualization / status output
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrameReport {
    pub device_earth: [[f64; 3]; 3],
    pub device_vehicle: [[f64; 3]; 3],
    pub moving: bool,
    pub speed: f64,
    pub course: f64,
}

impl From<&FrameUpdate> for FrameReport {
    fn from(update: &FrameUpdate) -> Self {
        Self {
            device_earth: update.rotations.device_earth.as_rows(),
            device_vehicle: update.rotations.device_vehicle.as_rows(),
            moving: update.rotations.moving,
            speed: update.fix.speed,
            course: update.fix.course,
        }
    }
}

/// Tracks `R_device_earth` and `R_device_vehicle` from injected sources.
pub struct ReferenceFrameTracker<A, L> {
    attitude_source: A,
    location_source: L,
    moving_threshold: f64,
    current: FrameUpdate,
    refreshes: u64,
}

impl<A: AttitudeSource, L: LocationSource> ReferenceFrameTracker<A, L> {
    pub fn new(attitude_source: A, location_source: L, moving_threshold: f64) -> Self {
        Self {
            attitude_source,
            location_source,
            moving_threshold,
            current: FrameUpdate {
                rotations: FrameRotations::default(),
                fix: LocationFix::unknown_heading(0.0),
            },
            refreshes: 0,
        }
    }

    /// Pull attitude and location once and recompute both rotations
    pub fn refresh(&mut self) -> FrameUpdate {
        let attitude = self.attitude_source.attitude();
        let fix = self.location_source.location();
        let rotations = FrameRotations::compute(attitude, &fix, self.moving_threshold);

        if rotations.moving != self.current.rotations.moving {
            if rotations.moving {
                log::debug!(
                    "Vehicle frame engaged (speed {:.2} m/s, course {:.1} deg)",
                    fix.speed,
                    fix.course
                );
            } else {
                log::debug!(
                    "Vehicle frame collapsed to identity (speed {:.2} m/s, course {:.1} deg)",
                    fix.speed,
                    fix.course
                );
            }
        }

        self.current = FrameUpdate { rotations, fix };
        self.refreshes += 1;
        self.current
    }

    pub fn current(&self) -> &FrameUpdate {
        &self.current
    }

    pub fn device_earth(&self) -> RotationMatrix {
        self.current.rotations.device_earth
    }

    pub fn device_vehicle(&self) -> RotationMatrix {
        self.current.rotations.device_vehicle
    }

    pub fn is_moving(&self) -> bool {
        self.current.rotations.moving
    }

    pub fn moving_threshold(&self) -> f64 {
        self.moving_threshold
    }

    pub fn refresh_count(&self) -> u64 {
        self.refreshes
    }
}
