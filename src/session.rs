use crate::error::{FrameError, FrameResult};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Recording state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Sampler ticking, nothing persisted
    Idle,
    /// Ticks are appended to the telemetry buffer
    Recording,
    /// Recording suspended, buffer kept
    Paused,
}

/// Session metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub start_time: String,
    pub state: SessionState,
    pub ticks_observed: u64,
    pub samples_recorded: u64,
    pub peak_speed_ms: f64,
}

/// Recording flag shared between the UI side and the sampler tick.
///
/// Cloning yields another handle onto the same session.
#[derive(Clone)]
pub struct Session {
    metadata: Arc<Mutex<SessionMetadata>>,
}

impl Session {
    /// Create new session in Idle state
    pub fn new() -> Self {
        let now = Utc::now();
        let metadata = SessionMetadata {
            session_id: format!("session_{}", now.timestamp_millis()),
            start_time: now.to_rfc3339(),
            state: SessionState::Idle,
            ticks_observed: 0,
            samples_recorded: 0,
            peak_speed_ms: 0.0,
        };

        Session {
            metadata: Arc::new(Mutex::new(metadata)),
        }
    }

    fn lock(&self) -> FrameResult<MutexGuard<'_, SessionMetadata>> {
        self.metadata
            .lock()
            .map_err(|_| FrameError::LockPoisoned("Failed to acquire metadata lock".to_string()))
    }

    /// Idle | Paused → Recording
    pub fn start_recording(&self) -> FrameResult<()> {
        let mut meta = self.lock()?;

        match meta.state {
            SessionState::Idle | SessionState::Paused => {
                meta.state = SessionState::Recording;
                log::info!("[{}] Recording started", meta.session_id);
                Ok(())
            }
            SessionState::Recording => Err(FrameError::AlreadyRecording),
        }
    }

    /// Recording → Paused
    pub fn pause_recording(&self) -> FrameResult<()> {
        let mut meta = self.lock()?;

        match meta.state {
            SessionState::Recording => {
                meta.state = SessionState::Paused;
                log::info!("[{}] Recording paused", meta.session_id);
                Ok(())
            }
            SessionState::Paused => Err(FrameError::InvalidState("Already paused".to_string())),
            SessionState::Idle => Err(FrameError::NotRecording),
        }
    }

    /// Recording | Paused → Idle
    pub fn stop_recording(&self) -> FrameResult<()> {
        let mut meta = self.lock()?;

        match meta.state {
            SessionState::Recording | SessionState::Paused => {
                meta.state = SessionState::Idle;
                log::info!(
                    "[{}] Recording stopped after {} samples",
                    meta.session_id,
                    meta.samples_recorded
                );
                Ok(())
            }
            SessionState::Idle => Err(FrameError::NotRecording),
        }
    }

    /// Record / Stop button semantics: Recording → Idle, otherwise → Recording
    pub fn toggle_recording(&self) -> FrameResult<SessionState> {
        if self.is_recording()? {
            self.stop_recording()?;
        } else {
            self.start_recording()?;
        }
        self.get_state()
    }

    pub fn get_state(&self) -> FrameResult<SessionState> {
        Ok(self.lock()?.state)
    }

    pub fn is_recording(&self) -> FrameResult<bool> {
        Ok(self.lock()?.state == SessionState::Recording)
    }

    /// Count one sampler tick; returns whether it should be persisted
    pub fn observe_tick(&self, speed: f64) -> FrameResult<bool> {
        let mut meta = self.lock()?;
        meta.ticks_observed += 1;

        if meta.state != SessionState::Recording {
            return Ok(false);
        }

        meta.samples_recorded += 1;
        if speed > meta.peak_speed_ms {
            meta.peak_speed_ms = speed;
        }
        Ok(true)
    }

    pub fn get_metadata(&self) -> FrameResult<SessionMetadata> {
        Ok(self.lock()?.clone())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
