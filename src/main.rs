use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::interval;

use vehicle_frame_rs::export::{self, SessionExport};
use vehicle_frame_rs::live_status::{self, FrameStatus};
use vehicle_frame_rs::sensors::SimulatedDrive;
use vehicle_frame_rs::visualize::FrameLogger;
use vehicle_frame_rs::{
    FrameUpdate, Session, SharedSampleBuffer, TelemetrySample, TelemetrySampler, TrackerConfig,
};

#[derive(Parser, Debug)]
#[command(name = "frame_tracker")]
#[command(about = "Vehicle reference-frame tracker - phone acceleration rotated into the vehicle frame", long_about = None)]
struct Args {
    /// Duration in seconds (0 = run the whole simulated drive)
    #[arg(value_name = "SECONDS", default_value = "0")]
    duration: u64,

    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Telemetry buffer capacity (samples)
    #[arg(long)]
    capacity: Option<usize>,

    /// Movement gate speed threshold (m/s)
    #[arg(long)]
    threshold: Option<f64>,

    /// Output directory
    #[arg(long)]
    output_dir: Option<String>,

    /// Start recording immediately
    #[arg(long)]
    record: bool,

    /// Also write a Rerun recording to this .rrd path
    #[arg(long)]
    rerun: Option<String>,
}

fn load_config(args: &Args) -> Result<TrackerConfig> {
    let mut config = match &args.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };
    if let Some(capacity) = args.capacity {
        config.buffer_capacity = capacity;
    }
    if let Some(threshold) = args.threshold {
        config.moving_threshold = threshold;
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = load_config(&args)?;

    println!("[{}] Frame Tracker Starting", ts_now());
    println!("  Duration: {} seconds (0=full drive)", args.duration);
    println!("  Sampling: {} ms", config.sampling_interval_ms);
    println!("  Buffer: {} samples", config.buffer_capacity);
    println!("  Moving threshold: {:.4} m/s", config.moving_threshold);
    println!("  Output Dir: {}", config.output_dir);

    std::fs::create_dir_all(&config.output_dir)?;

    let drive = SimulatedDrive::city_block(config.sampling_interval_secs());
    let max_ticks = if args.duration > 0 {
        config.ticks_for_duration(args.duration)
    } else {
        drive.len() as u64
    };

    let (attitude, location, accel) = drive.sources();
    let mut sampler = TelemetrySampler::from_config(attitude, location, accel, &config);
    let session = sampler.session();
    let buffer = sampler.buffer();

    if args.record {
        session.start_recording()?;
    } else {
        log::info!("Not recording; pass --record to buffer telemetry");
    }

    let rerun_logger = match &args.rerun {
        Some(path) => Some(FrameLogger::new(path)?),
        None => None,
    };

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("[{}] Interrupted, stopping...", ts_now());
                stop.store(true, Ordering::Relaxed);
            }
        });
    }

    let (frames_tx, frames_rx) = watch::channel(*sampler.tracker().current());
    let status_handle = tokio::spawn(status_loop(
        frames_rx,
        buffer.clone(),
        session.clone(),
        config.clone(),
        stop.clone(),
    ));

    let interval_secs = config.sampling_interval_secs();
    let mut tick_index = 0u64;
    let ticks = sampler
        .run_periodic(stop.clone(), Some(max_ticks), |report| {
            frames_tx.send_replace(report.update);
            if let Some(rr) = rerun_logger.as_ref() {
                rr.set_time(tick_index as f64 * interval_secs);
                rr.log_frames(&report.update);
                rr.log_sample(&report.sample);
            }
            tick_index += 1;
        })
        .await?;

    stop.store(true, Ordering::Relaxed);
    if let Err(e) = status_handle.await {
        log::warn!("Status task failed: {}", e);
    }

    // Final save
    let (snapshot, buffer_state) = buffer.snapshot_with_state()?;
    let stamp = ts_now_clean();
    let csv_path = Path::new(&config.output_dir).join(format!("telemetry_{}.csv", stamp));
    export::save_csv(&csv_path, &snapshot, interval_secs, false)?;

    let metadata = session.get_metadata()?;
    let session_path = Path::new(&config.output_dir).join(format!("session_{}.json.gz", stamp));
    SessionExport::new(metadata.clone(), interval_secs, config.buffer_capacity, snapshot.clone())
        .save(&session_path)?;

    let mut final_status = FrameStatus::new();
    final_status.apply_frames(sampler.tracker().current());
    final_status.apply_snapshot(&snapshot, config.buffer_capacity, buffer_state);
    final_status.apply_session(&metadata);
    let status_path = Path::new(&config.output_dir).join("live_status_final.json");
    if let Err(e) = final_status.save(&status_path) {
        log::warn!("Failed to write {}: {}", status_path.display(), e);
    }

    println!("\n=== Final Stats ===");
    println!("Ticks: {}", ticks);
    println!("Samples recorded: {}", metadata.samples_recorded);
    println!("Samples buffered: {}", snapshot.len());
    println!("Peak speed: {:.2} m/s", metadata.peak_speed_ms);
    println!("CSV: {}", csv_path.display());

    Ok(())
}

/// Writes `live_status.json` every `status_interval_secs` from a snapshot of
/// the shared buffer and the most recent frames.
async fn status_loop(
    frames: watch::Receiver<FrameUpdate>,
    buffer: SharedSampleBuffer<TelemetrySample>,
    session: Session,
    config: TrackerConfig,
    stop: Arc<AtomicBool>,
) {
    let start = Utc::now();
    let status_path = Path::new(&config.output_dir).join("live_status.json");
    let mut status = FrameStatus::new();
    let mut timer = interval(config.status_interval());

    while !stop.load(Ordering::Relaxed) {
        timer.tick().await;

        let update = *frames.borrow();
        let ((snapshot, state), meta) = match (buffer.snapshot_with_state(), session.get_metadata()) {
            (Ok(read), Ok(meta)) => (read, meta),
            (Err(e), _) | (_, Err(e)) => {
                log::warn!("Status snapshot failed: {}", e);
                continue;
            }
        };

        status.timestamp = live_status::current_timestamp();
        status.uptime_seconds = Utc::now().signed_duration_since(start).num_seconds().max(0) as u64;
        status.apply_frames(&update);
        status.apply_snapshot(&snapshot, config.buffer_capacity, state);
        status.apply_session(&meta);

        if let Err(e) = status.save(&status_path) {
            log::warn!("Failed to write {}: {}", status_path.display(), e);
        }
    }
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}

fn ts_now_clean() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}
