//! Reading session logs back.
//!
//! The logger itself treats records as opaque lines. This is the downstream
//! view: one JSON object per newline-terminated line.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One MPU6050 sample as served by the board's `/data` endpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionReading {
    pub acceleration: Vector3,
    pub gyroscope: Vector3,
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("cannot read log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line} of {path:?} is not a motion reading: {source}")]
    Malformed {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

pub fn parse_line(line: &str) -> Result<MotionReading, serde_json::Error> {
    serde_json::from_str(line.trim())
}

/// Well-formed-line tally for one log file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogCheck {
    pub well_formed: usize,
    pub malformed: usize,
    /// 1-based
    pub first_malformed_line: Option<usize>,
}

impl LogCheck {
    pub fn is_clean(&self) -> bool {
        self.malformed == 0
    }

    fn note_malformed(&mut self, line: usize) {
        self.malformed += 1;
        self.first_malformed_line.get_or_insert(line);
    }
}

fn read_log(path: &Path) -> Result<String, RecordError> {
    fs::read_to_string(path).map_err(|source| RecordError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Count lines that are complete JSON objects.
///
/// A line missing its terminating newline is a partial write and counts as
/// malformed, as do blank lines. Field contents are not inspected.
pub fn check_log(path: &Path) -> Result<LogCheck, RecordError> {
    let contents = read_log(path)?;
    let mut check = LogCheck::default();

    for (idx, raw) in contents.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;
        let Some(line) = raw.strip_suffix('\n') else {
            check.note_malformed(line_no);
            continue;
        };
        match serde_json::from_str::<serde_json::Value>(line) {
            Ok(serde_json::Value::Object(_)) => check.well_formed += 1,
            _ => check.note_malformed(line_no),
        }
    }

    Ok(check)
}

/// Parse every line of a session log into a [`MotionReading`].
pub fn read_readings(path: &Path) -> Result<Vec<MotionReading>, RecordError> {
    read_log(path)?
        .lines()
        .enumerate()
        .map(|(idx, line)| {
            parse_line(line).map_err(|source| RecordError::Malformed {
                path: path.to_path_buf(),
                line: idx + 1,
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"{"acceleration":{"x":0.12,"y":-0.03,"z":9.81},"gyroscope":{"x":0.5,"y":0.0,"z":-1.25},"roll":1.5,"pitch":-2.0,"yaw":180.0}"#;

    #[test]
    fn parses_sample_reading() {
        let reading = parse_line(SAMPLE).unwrap();
        assert_eq!(reading.acceleration.z, 9.81);
        assert_eq!(reading.gyroscope.z, -1.25);
        assert_eq!(reading.yaw, 180.0);
    }

    #[test]
    fn parse_rejects_missing_fields() {
        assert!(parse_line(r#"{"roll":1.0}"#).is_err());
        assert!(parse_line("not json").is_err());
    }

    #[test]
    fn check_counts_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        fs::write(&path, format!("{SAMPLE}\n{{\"other\":1}}\ngarbage\n\n{SAMPLE}\n")).unwrap();

        let check = check_log(&path).unwrap();
        assert_eq!(check.well_formed, 3);
        assert_eq!(check.malformed, 2);
        assert_eq!(check.first_malformed_line, Some(3));
        assert!(!check.is_clean());
    }

    #[test]
    fn unterminated_last_line_is_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        fs::write(&path, format!("{SAMPLE}\n{SAMPLE}")).unwrap();

        let check = check_log(&path).unwrap();
        assert_eq!(check.well_formed, 1);
        assert_eq!(check.first_malformed_line, Some(2));
    }

    #[test]
    fn empty_log_is_clean() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        fs::write(&path, "").unwrap();

        assert_eq!(check_log(&path).unwrap(), LogCheck::default());
        assert!(read_readings(&path).unwrap().is_empty());
    }

    #[test]
    fn read_readings_reports_line_number() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("log.txt");
        fs::write(&path, format!("{SAMPLE}\n{{\"roll\":1}}\n")).unwrap();

        assert_matches!(
            read_readings(&path),
            Err(RecordError::Malformed { line: 2, .. })
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        assert_matches!(
            check_log(&dir.path().join("absent.txt")),
            Err(RecordError::Io { .. })
        );
    }
}
