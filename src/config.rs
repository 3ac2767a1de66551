use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FrameError, FrameResult};
use crate::reference_frame::DEFAULT_MOVING_THRESHOLD;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    // ── Sampling ──
    pub sampling_interval_ms: u64,
    pub buffer_capacity: usize,

    // ── Movement gate ──
    /// m/s; the vehicle frame is only derived above this speed
    pub moving_threshold: f64,

    // ── Output ──
    pub status_interval_secs: u64,
    pub output_dir: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sampling_interval_ms: 100,
            buffer_capacity: 600,
            moving_threshold: DEFAULT_MOVING_THRESHOLD,
            status_interval_secs: 2,
            output_dir: "frame_tracker_sessions".to_string(),
        }
    }
}

impl TrackerConfig {
    /// Read a JSON config; missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> FrameResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: TrackerConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        log::info!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> FrameResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> FrameResult<()> {
        if self.sampling_interval_ms == 0 {
            return Err(FrameError::InvalidParameters(
                "sampling_interval_ms must be positive".to_string(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(FrameError::InvalidParameters(
                "buffer_capacity must be positive".to_string(),
            ));
        }
        if !self.moving_threshold.is_finite() || self.moving_threshold < 0.0 {
            return Err(FrameError::InvalidParameters(format!(
                "moving_threshold must be a non-negative speed, got {}",
                self.moving_threshold
            )));
        }
        Ok(())
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    pub fn sampling_interval_secs(&self) -> f64 {
        self.sampling_interval_ms as f64 / 1000.0
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs.max(1))
    }

    /// Number of sampling ticks that fit in `secs` seconds. Saturates for
    /// durations too long to express in milliseconds.
    pub fn ticks_for_duration(&self, secs: u64) -> u64 {
        secs.saturating_mul(1000) / self.sampling_interval_ms.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TrackerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sampling_interval(), Duration::from_millis(100));
        assert_eq!(config.sampling_interval_secs(), 0.1);
        assert_eq!(config.moving_threshold, 2.2452);
    }

    #[test]
    fn test_ticks_for_duration() {
        let config = TrackerConfig::default();
        assert_eq!(config.ticks_for_duration(0), 0);
        assert_eq!(config.ticks_for_duration(60), 600);

        let slow = TrackerConfig {
            sampling_interval_ms: 250,
            ..TrackerConfig::default()
        };
        assert_eq!(slow.ticks_for_duration(3), 12);

        // Huge durations clamp instead of overflowing
        assert_eq!(config.ticks_for_duration(u64::MAX), u64::MAX / 100);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = TrackerConfig::default();
        config.buffer_capacity = 0;
        assert!(matches!(config.validate(), Err(FrameError::InvalidParameters(_))));

        let mut config = TrackerConfig::default();
        config.sampling_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = TrackerConfig::default();
        config.moving_threshold = f64::NAN;
        assert!(config.validate().is_err());

        config.moving_threshold = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "buffer_capacity": 50, "moving_threshold": 4.0 }"#).unwrap();

        let config = TrackerConfig::load(&path).unwrap();
        assert_eq!(config.buffer_capacity, 50);
        assert_eq!(config.moving_threshold, 4.0);
        assert_eq!(config.sampling_interval_ms, 100);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = TrackerConfig::default();
        config.output_dir = "drives".to_string();
        config.save(&path).unwrap();

        assert_eq!(TrackerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "sampling_interval_ms": 0 }"#).unwrap();
        assert!(TrackerConfig::load(&path).is_err());

        assert!(matches!(
            TrackerConfig::load(dir.path().join("missing.json")),
            Err(FrameError::Storage(_))
        ));
    }
}
