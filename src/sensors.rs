//! Sensor providers for the frame tracker.
//!
//! Two families, both implementing the provider traits from
//! `reference_frame`:
//! - a simulated drive with the phone held in a fixed dash mount
//! - replay of recorded `SensorRecord` logs (`.json`, `.jsonl`, optionally `.gz`)
//!
//! Each provider owns its own tick counter over shared data, so a tracker and
//! a sampler pulling once per tick stay in lock-step.

use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use flate2::read::GzDecoder;

use crate::error::{FrameError, FrameResult};
use crate::reference_frame::{ground_to_vehicle, AccelerationSource, AttitudeSource, LocationSource};
use crate::rotation::RotationMatrix;
use crate::types::{LocationFix, SensorRecord, Vec3};

/// Below this the simulated GPS reports no course, like a stationary receiver
const SIM_HEADING_MIN_SPEED: f64 = 0.3;

// ─── Simulated drive ─────────────────────────────────────────────────────────

/// One leg of a simulated drive. Rates are per second.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DrivePhase {
    /// Speed up at `rate` m/s²
    Accelerate { ticks: usize, rate: f64 },
    /// Hold speed and course
    Cruise { ticks: usize },
    /// Change course at `rate_deg` deg/s (positive = right turn)
    Turn { ticks: usize, rate_deg: f64 },
    /// Slow down at `rate` m/s², never below standstill
    Brake { ticks: usize, rate: f64 },
}

/// Ground truth for a single tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriveState {
    pub speed: f64,
    /// Vehicle course in degrees; kept even when the GPS would not report it
    pub course: f64,
    /// device → earth
    pub attitude: RotationMatrix,
    /// Acceleration in vehicle axes: x lateral (right), y forward, z up
    pub vehicle_accel: Vec3,
}

impl DriveState {
    /// What the GPS receiver would report
    pub fn fix(&self) -> LocationFix {
        if self.speed < SIM_HEADING_MIN_SPEED {
            LocationFix::unknown_heading(self.speed)
        } else {
            LocationFix::new(self.speed, self.course)
        }
    }
}

/// Precomputed drive. Ticks past the end hold the final state.
#[derive(Clone, Debug)]
pub struct SimulatedDrive {
    states: Vec<DriveState>,
    mount: RotationMatrix,
    dt: f64,
}

impl SimulatedDrive {
    /// `mount` is the fixed device → vehicle rotation of the phone holder.
    pub fn build(phases: &[DrivePhase], dt: f64, mount: RotationMatrix, start_course: f64) -> Self {
        let mut states = Vec::new();
        let mut speed = 0.0_f64;
        let mut course = start_course.rem_euclid(360.0);

        let emit = |speed: f64, course: f64, accel: Vec3, states: &mut Vec<DriveState>| {
            // R_device_earth = R_device_vehicle * R_vehicle_earth
            let attitude = mount * ground_to_vehicle(course).transpose();
            states.push(DriveState {
                speed,
                course,
                attitude,
                vehicle_accel: accel,
            });
        };

        for phase in phases {
            match *phase {
                DrivePhase::Accelerate { ticks, rate } => {
                    for _ in 0..ticks {
                        speed += rate * dt;
                        emit(speed, course, Vec3::new(0.0, rate, 0.0), &mut states);
                    }
                }
                DrivePhase::Cruise { ticks } => {
                    for _ in 0..ticks {
                        emit(speed, course, Vec3::zeros(), &mut states);
                    }
                }
                DrivePhase::Turn { ticks, rate_deg } => {
                    let yaw_rate = rate_deg / 180.0 * PI;
                    for _ in 0..ticks {
                        course = (course + rate_deg * dt).rem_euclid(360.0);
                        // centripetal, toward the inside of the turn
                        emit(speed, course, Vec3::new(speed * yaw_rate, 0.0, 0.0), &mut states);
                    }
                }
                DrivePhase::Brake { ticks, rate } => {
                    for _ in 0..ticks {
                        let mut next = (speed - rate * dt).max(0.0);
                        if next < 1e-9 {
                            next = 0.0;
                        }
                        let applied = if dt > 0.0 { (speed - next) / dt } else { 0.0 };
                        speed = next;
                        emit(speed, course, Vec3::new(0.0, -applied, 0.0), &mut states);
                    }
                }
            }
        }

        if states.is_empty() {
            emit(0.0, course, Vec3::zeros(), &mut states);
        }

        Self { states, mount, dt }
    }

    /// Pull away heading north, cruise, take a right-hand bend, cruise east
    /// and brake to a stop. Phone tilted back in a dash mount.
    pub fn city_block(dt: f64) -> Self {
        let ticks = |secs: f64| (secs / dt).round().max(1.0) as usize;
        let phases = [
            DrivePhase::Cruise { ticks: ticks(1.0) },
            DrivePhase::Accelerate { ticks: ticks(5.0), rate: 3.0 },
            DrivePhase::Cruise { ticks: ticks(4.0) },
            DrivePhase::Turn { ticks: ticks(6.0), rate_deg: 15.0 },
            DrivePhase::Cruise { ticks: ticks(4.0) },
            DrivePhase::Brake { ticks: ticks(6.0), rate: 3.0 },
            DrivePhase::Cruise { ticks: ticks(1.0) },
        ];
        let mount = RotationMatrix::from_euler(0.05, -0.35, 0.2);
        Self::build(&phases, dt, mount, 0.0)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn duration_secs(&self) -> f64 {
        self.states.len() as f64 * self.dt
    }

    pub fn mount(&self) -> RotationMatrix {
        self.mount
    }

    pub fn state(&self, tick: usize) -> &DriveState {
        let idx = tick.min(self.states.len() - 1);
        &self.states[idx]
    }

    /// User acceleration as the phone's IMU would measure it
    pub fn device_accel(&self, tick: usize) -> Vec3 {
        // v_vehicle = v_device * M  ⇒  v_device = v_vehicle * Mᵀ
        self.mount.transpose().transform(&self.state(tick).vehicle_accel)
    }

    /// Three providers sharing this drive, each starting at tick 0
    pub fn sources(self) -> (SimAttitude, SimLocation, SimAcceleration) {
        let drive = Arc::new(self);
        (
            SimAttitude {
                drive: Arc::clone(&drive),
                tick: 0,
            },
            SimLocation {
                drive: Arc::clone(&drive),
                tick: 0,
            },
            SimAcceleration { drive, tick: 0 },
        )
    }
}

pub struct SimAttitude {
    drive: Arc<SimulatedDrive>,
    tick: usize,
}

impl AttitudeSource for SimAttitude {
    fn attitude(&mut self) -> RotationMatrix {
        let attitude = self.drive.state(self.tick).attitude;
        self.tick += 1;
        attitude
    }
}

pub struct SimLocation {
    drive: Arc<SimulatedDrive>,
    tick: usize,
}

impl LocationSource for SimLocation {
    fn location(&mut self) -> LocationFix {
        let fix = self.drive.state(self.tick).fix();
        self.tick += 1;
        fix
    }
}

pub struct SimAcceleration {
    drive: Arc<SimulatedDrive>,
    tick: usize,
}

impl AccelerationSource for SimAcceleration {
    fn acceleration(&mut self) -> Vec3 {
        let accel = self.drive.device_accel(self.tick);
        self.tick += 1;
        accel
    }
}

// ─── Log replay ──────────────────────────────────────────────────────────────

/// Load recorded sensor snapshots.
///
/// Accepts a JSON array or one JSON object per line. Files ending in `.gz`
/// are decompressed on the fly.
pub fn load_records(path: &Path) -> FrameResult<Vec<SensorRecord>> {
    let file = File::open(path)?;
    let reader: Box<dyn Read> = if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let mut reader = BufReader::new(reader);

    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    parse_records(&contents)
}

fn parse_records(contents: &str) -> FrameResult<Vec<SensorRecord>> {
    let trimmed = contents.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    let mut records = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record = SensorRecord::from_json(line).map_err(|e| {
            FrameError::Serialization(format!("line {}: {}", line_no + 1, e))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Shared cursor-free view over a recorded log.
///
/// Past the last record every provider keeps returning the final one.
#[derive(Clone, Debug)]
pub struct ReplayLog {
    records: Arc<Vec<SensorRecord>>,
}

impl ReplayLog {
    pub fn new(records: Vec<SensorRecord>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }

    pub fn load(path: &Path) -> FrameResult<Self> {
        let records = load_records(path)?;
        log::info!("Loaded {} sensor records from {}", records.len(), path.display());
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn get(&self, idx: usize) -> Option<&SensorRecord> {
        self.records.get(idx).or_else(|| self.records.last())
    }

    pub fn sources(&self) -> (ReplayAttitude, ReplayLocation, ReplayAcceleration) {
        (
            ReplayAttitude {
                log: self.clone(),
                cursor: 0,
            },
            ReplayLocation {
                log: self.clone(),
                cursor: 0,
            },
            ReplayAcceleration {
                log: self.clone(),
                cursor: 0,
            },
        )
    }
}

pub struct ReplayAttitude {
    log: ReplayLog,
    cursor: usize,
}

impl AttitudeSource for ReplayAttitude {
    fn attitude(&mut self) -> RotationMatrix {
        let attitude = self
            .log
            .get(self.cursor)
            .map(|r| RotationMatrix::attitude_from_euler(r.roll, r.pitch, r.yaw))
            .unwrap_or_default();
        self.cursor += 1;
        attitude
    }
}

pub struct ReplayLocation {
    log: ReplayLog,
    cursor: usize,
}

impl LocationSource for ReplayLocation {
    fn location(&mut self) -> LocationFix {
        let fix = self
            .log
            .get(self.cursor)
            .map(SensorRecord::location_fix)
            .unwrap_or_else(|| LocationFix::unknown_heading(0.0));
        self.cursor += 1;
        fix
    }
}

pub struct ReplayAcceleration {
    log: ReplayLog,
    cursor: usize,
}

impl AccelerationSource for ReplayAcceleration {
    fn acceleration(&mut self) -> Vec3 {
        let accel = self.log.get(self.cursor).map(SensorRecord::accel).unwrap_or_else(Vec3::zeros);
        self.cursor += 1;
        accel
    }
}
