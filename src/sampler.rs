//! Fixed-rate telemetry collection.
//!
//! Each tick refreshes the reference frames, rotates the device acceleration
//! into the vehicle frame and, while the session is recording, appends one
//! sample to the shared buffer. Readers on other tasks use
//! [`SharedSampleBuffer::snapshot`]; only the tick handler pushes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use crate::buffer::SharedSampleBuffer;
use crate::config::TrackerConfig;
use crate::error::FrameResult;
use crate::reference_frame::{
    AccelerationSource, AttitudeSource, FrameUpdate, LocationSource, ReferenceFrameTracker,
};
use crate::session::Session;
use crate::types::{TelemetrySample, Vec3};

/// What a single tick saw and did
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickReport {
    pub update: FrameUpdate,
    pub device_accel: Vec3,
    pub vehicle_accel: Vec3,
    pub sample: TelemetrySample,
    pub recorded: bool,
}

pub struct TelemetrySampler<A, L, C> {
    tracker: ReferenceFrameTracker<A, L>,
    accel_source: C,
    buffer: SharedSampleBuffer<TelemetrySample>,
    session: Session,
    sampling_interval: Duration,
    ticks: u64,
}

impl<A, L, C> TelemetrySampler<A, L, C>
where
    A: AttitudeSource,
    L: LocationSource,
    C: AccelerationSource,
{
    pub fn new(
        tracker: ReferenceFrameTracker<A, L>,
        accel_source: C,
        buffer_capacity: usize,
        sampling_interval: Duration,
    ) -> Self {
        Self {
            tracker,
            accel_source,
            buffer: SharedSampleBuffer::new(buffer_capacity, TelemetrySample::invalid()),
            session: Session::new(),
            sampling_interval,
            ticks: 0,
        }
    }

    /// Builds the tracker and sampler from a validated config
    pub fn from_config(attitude: A, location: L, accel_source: C, config: &TrackerConfig) -> Self {
        let tracker = ReferenceFrameTracker::new(attitude, location, config.moving_threshold);
        Self::new(
            tracker,
            accel_source,
            config.buffer_capacity,
            config.sampling_interval(),
        )
    }

    /// Share an externally owned session (e.g. one driven by a UI toggle)
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    pub fn tick(&mut self) -> FrameResult<TickReport> {
        let update = self.tracker.refresh();
        let device_accel = self.accel_source.acceleration();

        // Without a meaningful heading the rotated vector would be an artifact
        let vehicle_accel = if update.rotations.moving {
            update.rotations.device_vehicle.transform(&device_accel)
        } else {
            Vec3::zeros()
        };

        let sample = TelemetrySample::from_vector(&vehicle_accel, update.fix.speed);
        let recorded = self.session.observe_tick(update.fix.speed)?;
        if recorded {
            self.buffer.push(sample)?;
        }
        self.ticks += 1;

        Ok(TickReport {
            update,
            device_accel,
            vehicle_accel,
            sample,
            recorded,
        })
    }

    /// Tick at the sampling interval until `stop` is raised or `max_ticks`
    /// have run, handing every report to `on_tick`. Returns the number of
    /// ticks performed.
    pub async fn run_periodic<F>(
        &mut self,
        stop: Arc<AtomicBool>,
        max_ticks: Option<u64>,
        mut on_tick: F,
    ) -> FrameResult<u64>
    where
        F: FnMut(&TickReport),
    {
        let mut timer = interval(self.sampling_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut performed = 0u64;

        loop {
            timer.tick().await;
            if stop.load(Ordering::Relaxed) {
                break;
            }
            if max_ticks.is_some_and(|max| performed >= max) {
                break;
            }

            let report = self.tick()?;
            on_tick(&report);
            performed += 1;

            if performed % 100 == 0 {
                log::debug!("[sampler] {} ticks, {} buffered", self.ticks, self.buffer.len()?);
            }
        }

        Ok(performed)
    }

    pub fn buffer(&self) -> SharedSampleBuffer<TelemetrySample> {
        self.buffer.clone()
    }

    pub fn session(&self) -> Session {
        self.session.clone()
    }

    pub fn tracker(&self) -> &ReferenceFrameTracker<A, L> {
        &self.tracker
    }

    pub fn sampling_interval(&self) -> Duration {
        self.sampling_interval
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn snapshot(&self) -> FrameResult<Vec<TelemetrySample>> {
        self.buffer.snapshot()
    }
}
