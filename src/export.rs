use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::FrameResult;
use crate::session::SessionMetadata;
use crate::types::TelemetrySample;

// ─── CSV ─────────────────────────────────────────────────────────────────────

pub const CSV_HEADER: [&str; 5] = ["time_s", "accel_x", "accel_y", "accel_z", "speed"];

/// One exported row. `time_s` is implied by the row index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CsvRow {
    pub time_s: f64,
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub speed: f64,
}

impl CsvRow {
    pub fn from_sample(index: usize, interval_secs: f64, sample: &TelemetrySample) -> Self {
        Self {
            time_s: index as f64 * interval_secs,
            accel_x: sample.accel_x,
            accel_y: sample.accel_y,
            accel_z: sample.accel_z,
            speed: sample.speed,
        }
    }

    pub fn sample(&self) -> TelemetrySample {
        TelemetrySample::new(self.accel_x, self.accel_y, self.accel_z, self.speed)
    }
}

/// Write samples oldest first. Row numbering starts at `first_index`.
pub fn write_csv<W: Write>(
    writer: W,
    samples: &[TelemetrySample],
    interval_secs: f64,
    first_index: usize,
    with_header: bool,
) -> FrameResult<()> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    if with_header {
        wtr.write_record(CSV_HEADER)?;
    }
    for (i, sample) in samples.iter().enumerate() {
        wtr.serialize(CsvRow::from_sample(first_index + i, interval_secs, sample))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn to_csv_string(samples: &[TelemetrySample], interval_secs: f64) -> FrameResult<String> {
    let mut out = Vec::new();
    write_csv(&mut out, samples, interval_secs, 0, true)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Save a snapshot as CSV.
///
/// With `append`, rows go to the end of an existing file without a second
/// header and the time column continues from the rows already there.
/// Returns the number of rows written.
pub fn save_csv(
    path: &Path,
    samples: &[TelemetrySample],
    interval_secs: f64,
    append: bool,
) -> FrameResult<usize> {
    let existing = if append && path.exists() {
        count_rows(path)?
    } else {
        None
    };

    let file = match existing {
        Some(_) => OpenOptions::new().append(true).open(path)?,
        None => File::create(path)?,
    };
    let first_index = existing.unwrap_or(0);
    write_csv(
        BufWriter::new(file),
        samples,
        interval_secs,
        first_index,
        existing.is_none(),
    )?;

    log::info!(
        "Wrote {} samples to {}{}",
        samples.len(),
        path.display(),
        if existing.is_some() { " (appended)" } else { "" }
    );
    Ok(samples.len())
}

/// Data rows in an existing export, or None for an empty file
fn count_rows(path: &Path) -> FrameResult<Option<usize>> {
    if std::fs::metadata(path)?.len() == 0 {
        return Ok(None);
    }
    let mut rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let mut rows = 0;
    for record in rdr.records() {
        record?;
        rows += 1;
    }
    Ok(Some(rows))
}

pub fn read_csv(path: &Path) -> FrameResult<Vec<CsvRow>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

// ─── JSON session export ─────────────────────────────────────────────────────

/// Complete recorded session (JSON-serializable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionExport {
    pub metadata: SessionMetadata,
    pub sampling_interval_s: f64,
    pub buffer_capacity: usize,
    pub samples: Vec<TelemetrySample>,
}

impl SessionExport {
    pub fn new(
        metadata: SessionMetadata,
        sampling_interval_s: f64,
        buffer_capacity: usize,
        samples: Vec<TelemetrySample>,
    ) -> Self {
        Self {
            metadata,
            sampling_interval_s,
            buffer_capacity,
            samples,
        }
    }

    pub fn to_json(&self) -> FrameResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 * self.sampling_interval_s
    }

    /// Writes pretty JSON, gzip-compressed when the path ends in `.gz`
    pub fn save(&self, path: &Path) -> FrameResult<()> {
        let mut file = BufWriter::new(File::create(path)?);
        if is_gz(path) {
            let mut encoder = GzEncoder::new(file, Compression::default());
            serde_json::to_writer_pretty(&mut encoder, self)?;
            encoder.finish()?.flush()?;
        } else {
            serde_json::to_writer_pretty(&mut file, self)?;
            file.flush()?;
        }
        log::info!(
            "Saved session {} ({} samples) to {}",
            self.metadata.session_id,
            self.samples.len(),
            path.display()
        );
        Ok(())
    }

    pub fn load(path: &Path) -> FrameResult<Self> {
        let file = File::open(path)?;
        let reader: Box<dyn Read> = if is_gz(path) {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(serde_json::from_reader(BufReader::new(reader))?)
    }
}

fn is_gz(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("gz")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;

    fn samples(n: usize) -> Vec<TelemetrySample> {
        (0..n)
            .map(|i| TelemetrySample::new(i as f64 * 0.5, -0.25, 0.0, 10.0 + i as f64))
            .collect()
    }

    #[test]
    fn test_csv_header_and_time_column() {
        let csv = to_csv_string(&samples(3), 0.1).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "time_s,accel_x,accel_y,accel_z,speed");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "0.0,0.0,-0.25,0.0,10.0");
        assert!(lines[3].starts_with("0.2,1.0,"));
    }

    #[test]
    fn test_empty_snapshot_writes_header_only() {
        let csv = to_csv_string(&[], 0.1).unwrap();
        assert_eq!(csv.trim_end(), "time_s,accel_x,accel_y,accel_z,speed");
    }

    #[test]
    fn test_save_and_read_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drive.csv");

        assert_eq!(save_csv(&path, &samples(4), 0.1, false).unwrap(), 4);
        let rows = read_csv(&path).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[2].sample(), samples(4)[2]);
        assert!((rows[3].time_s - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_append_skips_header_and_continues_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drive.csv");

        save_csv(&path, &samples(2), 0.5, true).unwrap();
        save_csv(&path, &samples(3), 0.5, true).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("time_s").count(), 1);

        let rows = read_csv(&path).unwrap();
        let times: Vec<f64> = rows.iter().map(|r| r.time_s).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn test_overwrite_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drive.csv");

        save_csv(&path, &samples(5), 0.1, false).unwrap();
        save_csv(&path, &samples(1), 0.1, false).unwrap();
        assert_eq!(read_csv(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_session_export_json_and_gz() {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new();
        session.start_recording().unwrap();
        session.observe_tick(14.0).unwrap();

        let export = SessionExport::new(session.get_metadata().unwrap(), 0.1, 600, samples(10));
        assert!((export.duration_secs() - 1.0).abs() < 1e-12);
        assert!(export.to_json().unwrap().contains("\"sampling_interval_s\": 0.1"));

        let plain = dir.path().join("session.json");
        export.save(&plain).unwrap();
        let loaded = SessionExport::load(&plain).unwrap();
        assert_eq!(loaded.samples, export.samples);
        assert_eq!(loaded.metadata.samples_recorded, 1);

        let gz = dir.path().join("session.json.gz");
        export.save(&gz).unwrap();
        let raw = std::fs::read(&gz).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);
        assert_eq!(SessionExport::load(&gz).unwrap().samples.len(), 10);
    }
}
