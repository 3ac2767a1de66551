use std::path::PathBuf;

use clap::Parser;
use vehicle_frame_rs::export;
use vehicle_frame_rs::sensors::ReplayLog;
use vehicle_frame_rs::visualize::FrameLogger;
use vehicle_frame_rs::{TelemetrySampler, TrackerConfig};

#[derive(Parser, Debug)]
struct Args {
    /// Path to a recorded sensor log (.json / .jsonl, optionally .gz)
    #[arg(long)]
    log: PathBuf,

    /// CSV output path
    #[arg(long, default_value = "replay_telemetry.csv")]
    out: PathBuf,

    /// Append to an existing CSV instead of overwriting it
    #[arg(long, default_value_t = false)]
    append: bool,

    /// JSON config file (sampling interval, threshold)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Movement gate speed threshold (m/s)
    #[arg(long)]
    threshold: Option<f64>,

    /// Also write a Rerun recording to this .rrd path
    #[arg(long)]
    rerun: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.moving_threshold = threshold;
    }

    let log = ReplayLog::load(&args.log)?;
    if log.is_empty() {
        anyhow::bail!("{} contains no sensor records", args.log.display());
    }
    // Keep every replayed tick
    config.buffer_capacity = config.buffer_capacity.max(log.len());
    config.validate()?;

    let (attitude, location, accel) = log.sources();
    let mut sampler = TelemetrySampler::from_config(attitude, location, accel, &config);
    sampler.session().start_recording()?;

    let rerun_logger = match &args.rerun {
        Some(path) => Some(FrameLogger::new(path)?),
        None => None,
    };

    let interval_secs = config.sampling_interval_secs();
    let mut moving_ticks = 0usize;
    for i in 0..log.len() {
        let report = sampler.tick()?;
        if report.update.rotations.moving {
            moving_ticks += 1;
        }
        if let Some(rr) = rerun_logger.as_ref() {
            rr.set_time(i as f64 * interval_secs);
            rr.log_frames(&report.update);
            rr.log_sample(&report.sample);
        }
    }
    sampler.session().stop_recording()?;

    let snapshot = sampler.snapshot()?;
    let written = export::save_csv(&args.out, &snapshot, interval_secs, args.append)?;

    println!("=== Replay ===");
    println!("Records: {}", log.len());
    println!(
        "Moving ticks: {} ({:.1}%)",
        moving_ticks,
        100.0 * moving_ticks as f64 / log.len() as f64
    );
    println!("Rows written: {} -> {}", written, args.out.display());

    Ok(())
}
