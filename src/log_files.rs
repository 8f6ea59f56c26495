use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const LOG_PREFIX: &str = "mpu6050_log_";
pub const LOG_EXTENSION: &str = ".txt";

/// A session log found in the log directory
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LogFile {
    pub index: u64,
    pub path: PathBuf,
}

pub fn log_file_name(index: u64) -> String {
    format!("{LOG_PREFIX}{index}{LOG_EXTENSION}")
}

/// Session index encoded in `name`, if it follows the `mpu6050_log_<N>.txt` pattern
pub fn parse_log_index(name: &str) -> Option<u64> {
    let digits = name.strip_prefix(LOG_PREFIX)?.strip_suffix(LOG_EXTENSION)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Too many digits for u64 is treated like any other malformed name
    digits.parse().ok()
}

fn scan(dir: &Path) -> io::Result<Vec<LogFile>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(index) = name.to_str().and_then(parse_log_index) else {
            continue;
        };
        found.push(LogFile {
            index,
            path: entry.path(),
        });
    }
    Ok(found)
}

/// Session logs in `dir`, ordered by index. A missing directory has none.
pub fn list_logs(dir: &Path) -> io::Result<Vec<LogFile>> {
    let mut logs = match scan(dir) {
        Ok(logs) => logs,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    logs.sort();
    Ok(logs)
}

/// Path for the next session log in `dir`, creating the directory if needed.
///
/// The index is one past the highest existing index, or 1 for a directory
/// without session logs. Nothing is created besides the directory, so calling
/// this twice without writing a log yields the same path.
pub fn next_log_path(dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let next = match scan(dir)?.into_iter().map(|log| log.index).max() {
        Some(highest) => highest.checked_add(1).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("log index space exhausted in {}", dir.display()),
            )
        })?,
        None => 1,
    };

    Ok(dir.join(log_file_name(next)))
}
