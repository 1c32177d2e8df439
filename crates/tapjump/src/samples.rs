use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::evaluator::CalibrationSample;

/// Append-only JSON-lines file of calibration samples, one object per line.
pub struct SampleLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl SampleLog {
    /// Open `path` for appending, creating it if needed.
    pub fn append_to(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one sample and flush, so an interrupted run keeps every line.
    pub fn record(&mut self, sample: &CalibrationSample) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, sample)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::JumpOutcome;

    #[test]
    fn appends_one_json_object_per_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("samples.jsonl");
        let sample = CalibrationSample {
            actual_distance: 81.5,
            duration_ms: 200,
            landed_on_center: false,
            outcome: JumpOutcome::Short,
            miss: 38.5,
        };

        SampleLog::append_to(&path)
            .and_then(|mut log| log.record(&sample))
            .expect("first write");
        let mut log = SampleLog::append_to(&path).expect("reopen");
        log.record(&CalibrationSample {
            landed_on_center: true,
            ..sample
        })
        .expect("second write");
        drop(log);

        let text = std::fs::read_to_string(&path).expect("read back");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: CalibrationSample = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(first, sample);
        assert!(lines[1].contains("\"landed_on_center\":true"));
        assert!(lines[0].contains("\"outcome\":\"short\""));
    }
}
