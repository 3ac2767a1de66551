use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::buffer::BufferState;
use crate::error::FrameResult;
use crate::reference_frame::FrameUpdate;
use crate::rotation::Quaternion;
use crate::session::{SessionMetadata, SessionState};
use crate::types::TelemetrySample;

/// Periodic JSON snapshot of the tracker for external dashboards
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FrameStatus {
    pub timestamp: f64,
    pub uptime_seconds: u64,
    pub ticks: u64,
    pub samples_recorded: u64,
    pub recording: bool,
    // Buffer
    pub buffered: usize,
    pub buffer_capacity: usize,
    pub buffer_state: BufferState,
    // Latest vehicle-frame sample
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    // Location / gate
    pub moving: bool,
    pub speed: f64,
    pub course: f64,
    // Reference frames
    pub device_earth: [[f64; 3]; 3],
    pub device_vehicle: [[f64; 3]; 3],
    pub device_earth_quat: Quaternion,
    pub device_vehicle_quat: Quaternion,
}

impl FrameStatus {
    pub fn new() -> Self {
        let identity = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        Self {
            timestamp: current_timestamp(),
            uptime_seconds: 0,
            ticks: 0,
            samples_recorded: 0,
            recording: false,
            buffered: 0,
            buffer_capacity: 0,
            buffer_state: BufferState::Empty,
            accel_x: 0.0,
            accel_y: 0.0,
            accel_z: 0.0,
            moving: false,
            speed: 0.0,
            course: -1.0,
            device_earth: identity,
            device_vehicle: identity,
            device_earth_quat: Quaternion::identity(),
            device_vehicle_quat: Quaternion::identity(),
        }
    }

    /// Copy in the latest frames. Quaternions keep their previous value when
    /// the closed-form extraction is degenerate.
    pub fn apply_frames(&mut self, update: &FrameUpdate) {
        let rot = &update.rotations;
        self.moving = rot.moving;
        self.speed = update.fix.speed;
        self.course = update.fix.course;
        self.device_earth = rot.device_earth.as_rows();
        self.device_vehicle = rot.device_vehicle.as_rows();
        self.device_earth_quat = rot.device_earth.update_quaternion(self.device_earth_quat).value;
        self.device_vehicle_quat = rot.device_vehicle.update_quaternion(self.device_vehicle_quat).value;
    }

    /// Fill level and the newest sample from a non-destructive snapshot.
    /// `state` is the buffer's own state, read together with the snapshot.
    pub fn apply_snapshot(&mut self, snapshot: &[TelemetrySample], capacity: usize, state: BufferState) {
        self.buffered = snapshot.len();
        self.buffer_capacity = capacity;
        self.buffer_state = state;
        if let Some(last) = snapshot.last() {
            self.accel_x = last.accel_x;
            self.accel_y = last.accel_y;
            self.accel_z = last.accel_z;
        }
    }

    pub fn apply_session(&mut self, meta: &SessionMetadata) {
        self.ticks = meta.ticks_observed;
        self.samples_recorded = meta.samples_recorded;
        self.recording = meta.state == SessionState::Recording;
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> FrameResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Default for FrameStatus {
    fn default() -> Self {
        Self::new()
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
