// Vehicle reference-frame tracking
// Rotates phone IMU acceleration into the vehicle frame using GPS course
pub mod buffer;
pub mod config;
pub mod error;
pub mod export;
pub mod live_status;
pub mod reference_frame;
pub mod rotation;
pub mod sampler;
pub mod sensors;
pub mod session;
pub mod types;
pub mod visualize;

pub use buffer::{BoundedSampleBuffer, BufferState, SharedSampleBuffer};
pub use config::TrackerConfig;
pub use error::{FrameError, FrameResult};
pub use reference_frame::{
    AccelerationSource, AttitudeSource, FrameRotations, FrameUpdate, LocationSource,
    ReferenceFrameTracker, DEFAULT_MOVING_THRESHOLD,
};
pub use rotation::{Quaternion, QuaternionUpdate, RotationMatrix};
pub use sampler::{TelemetrySampler, TickReport};
pub use session::{Session, SessionMetadata, SessionState};
pub use types::{LocationFix, SensorRecord, TelemetrySample};
