use anyhow::Result;
use rerun::{
    archetypes::{Arrows3D, Scalar},
    components::Color,
    RecordingStreamBuilder,
};

use crate::reference_frame::FrameUpdate;
use crate::rotation::RotationMatrix;
use crate::types::TelemetrySample;

const AXIS_COLORS: [(u8, u8, u8); 3] = [(230, 60, 60), (60, 200, 90), (70, 110, 235)];

// Frames are drawn side by side so the axis sets don't overlap
const EARTH_ORIGIN: [f32; 3] = [0.0, 0.0, 0.0];
const DEVICE_ORIGIN: [f32; 3] = [3.0, 0.0, 0.0];
const VEHICLE_ORIGIN: [f32; 3] = [6.0, 0.0, 0.0];

/// Axes of a frame expressed in the parent frame.
///
/// With row vectors, `e_i * R` is row `i` of `R`.
pub fn axis_vectors(rotation: &RotationMatrix) -> [[f32; 3]; 3] {
    let rows = rotation.as_rows();
    let mut axes = [[0.0f32; 3]; 3];
    for (axis, row) in axes.iter_mut().zip(rows.iter()) {
        for (dst, src) in axis.iter_mut().zip(row.iter()) {
            *dst = *src as f32;
        }
    }
    axes
}

/// Rerun 3D view of the earth, device and vehicle frames plus the
/// vehicle-frame telemetry as time series.
pub struct FrameLogger {
    rec: rerun::RecordingStream,
}

impl FrameLogger {
    /// Record to an `.rrd` file
    pub fn new(output_path: &str) -> Result<Self> {
        let rec = RecordingStreamBuilder::new("vehicle_frame_tracker")
            .save(output_path)
            .map_err(|e| anyhow::anyhow!("Failed to create Rerun recording: {}", e))?;

        log::info!("[RERUN] Recording initialized to: {}", output_path);

        Ok(FrameLogger { rec })
    }

    pub fn set_time(&self, elapsed_secs: f64) {
        self.rec.set_time_seconds("stable_time", elapsed_secs);
    }

    pub fn log_scalar(&self, path: &str, value: f64) {
        let _ = self.rec.log(path, &Scalar::new(value));
    }

    fn log_axes(&self, path: &str, origin: [f32; 3], axes: [[f32; 3]; 3]) {
        let arrows = Arrows3D::from_vectors(axes)
            .with_origins([origin; 3])
            .with_colors(AXIS_COLORS.map(|(r, g, b)| Color::from_rgb(r, g, b)));
        let _ = self.rec.log(path, &arrows);
    }

    /// Earth axes, device axes (device → earth) and vehicle axes, all in earth coordinates
    pub fn log_frames(&self, update: &FrameUpdate) {
        let rot = &update.rotations;
        // R_vehicle_earth = R_vehicle_device * R_device_earth
        let vehicle_earth = rot.device_vehicle.transpose() * rot.device_earth;

        self.log_axes("frames/earth", EARTH_ORIGIN, axis_vectors(&RotationMatrix::identity()));
        self.log_axes("frames/device", DEVICE_ORIGIN, axis_vectors(&rot.device_earth));
        self.log_axes("frames/vehicle", VEHICLE_ORIGIN, axis_vectors(&vehicle_earth));

        self.log_scalar("gps/speed", update.fix.speed);
        self.log_scalar("gps/course", update.fix.course);
        self.log_scalar("gate/moving", if rot.moving { 1.0 } else { 0.0 });
    }

    pub fn log_sample(&self, sample: &TelemetrySample) {
        self.log_scalar("telemetry/accel_x", sample.accel_x);
        self.log_scalar("telemetry/accel_y", sample.accel_y);
        self.log_scalar("telemetry/accel_z", sample.accel_z);
        self.log_scalar("telemetry/speed", sample.speed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_vectors_are_rows() {
        let r = RotationMatrix::rotate_z(std::f64::consts::FRAC_PI_2);
        let axes = axis_vectors(&r);
        // x lands on -y, y on +x
        assert!((axes[0][1] + 1.0).abs() < 1e-6);
        assert!((axes[1][0] - 1.0).abs() < 1e-6);
        assert_eq!(axes[2], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_identity_axes() {
        let axes = axis_vectors(&RotationMatrix::identity());
        assert_eq!(axes, [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
    }
}
