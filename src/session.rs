use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::log_files::next_log_path;
use crate::runtime::{CancelToken, Ticker};
use crate::transport::{Fetch, SkipReason, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Active,
    Stopped,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Active => "active",
            SessionState::Stopped => "stopped",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Local failures; any of these ends the session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot prepare log directory {path:?}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot open log file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot write to log file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("session is {actual}, expected {expected}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub log_dir: PathBuf,
    /// Stop on our own after this many fetch attempts
    pub max_polls: Option<u64>,
}

impl SessionConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            max_polls: None,
        }
    }

    pub fn with_max_polls(mut self, max_polls: u64) -> Self {
        self.max_polls = Some(max_polls);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub polls: u64,
    pub written: u64,
    pub skipped: u64,
}

/// What one poll did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Recorded,
    Skipped(SkipReason),
}

/// Summary handed back once a session has left `Active`
#[derive(Debug)]
pub struct SessionReport {
    pub path: Option<PathBuf>,
    pub state: SessionState,
    pub stats: SessionStats,
    pub started_at: Option<DateTime<Local>>,
    pub ended_at: DateTime<Local>,
    pub failure: Option<SessionError>,
}

impl SessionReport {
    /// Wall-clock time spent active; `None` if the session never started
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.started_at
            .map(|started| self.ended_at.signed_duration_since(started))
    }

    /// "12.3s" style rendering of [`SessionReport::duration`]
    pub fn duration_text(&self) -> String {
        match self.duration() {
            Some(d) => format!("{:.1}s", d.num_milliseconds().max(0) as f64 / 1000.0),
            None => "0.0s".to_string(),
        }
    }
}

/// Exclusive write handle on the session's log file
#[derive(Debug)]
struct LogSink {
    file: File,
    path: PathBuf,
}

impl LogSink {
    fn create(path: &Path) -> Result<Self, SessionError> {
        let file = File::create(path).map_err(|source| SessionError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Writes `record` as one line and forces it to disk before returning.
    fn append(&mut self, record: &str) -> Result<(), SessionError> {
        let mut line = String::with_capacity(record.len() + 1);
        // Embedded line breaks would split one record across lines
        line.extend(
            record
                .chars()
                .map(|c| if c == '\n' || c == '\r' { ' ' } else { c }),
        );
        line.push('\n');

        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.sync_data())
            .map_err(|source| SessionError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

/// One logging run: a fresh log file fed by repeated polls.
///
/// The file handle lives only while the session is `Active`; leaving that
/// state by stop, failure or drop closes it.
pub struct PollingSession<'a, T: Transport + ?Sized, K: Ticker + ?Sized> {
    transport: &'a T,
    ticker: &'a K,
    config: SessionConfig,
    state: SessionState,
    sink: Option<LogSink>,
    path: Option<PathBuf>,
    stats: SessionStats,
    started_at: Option<DateTime<Local>>,
}

impl<'a, T: Transport + ?Sized, K: Ticker + ?Sized> PollingSession<'a, T, K> {
    pub fn new(transport: &'a T, ticker: &'a K, config: SessionConfig) -> Self {
        Self {
            transport,
            ticker,
            config,
            state: SessionState::Idle,
            sink: None,
            path: None,
            stats: SessionStats::default(),
            started_at: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    fn expect_state(&self, expected: SessionState) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    fn fail(&mut self, err: &SessionError) {
        error!("logging session failed: {err}");
        self.sink = None;
        self.state = SessionState::Failed;
    }

    /// Idle -> Active: allocate the next log file and open it for writing.
    pub fn start(&mut self) -> Result<PathBuf, SessionError> {
        self.expect_state(SessionState::Idle)?;

        let dir = &self.config.log_dir;
        let result = next_log_path(dir)
            .map_err(|source| SessionError::Directory {
                path: dir.clone(),
                source,
            })
            .and_then(|path| LogSink::create(&path).map(|sink| (path, sink)));

        match result {
            Ok((path, sink)) => {
                info!(
                    "logging live MPU6050 data to {} every {:?}",
                    path.display(),
                    self.ticker.interval()
                );
                self.sink = Some(sink);
                self.path = Some(path.clone());
                self.started_at = Some(Local::now());
                self.state = SessionState::Active;
                Ok(path)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Fetch once and record the reading, if there is one. Does not wait.
    pub fn poll_once(&mut self) -> Result<PollOutcome, SessionError> {
        self.expect_state(SessionState::Active)?;
        self.stats.polls += 1;

        match self.transport.fetch_reading() {
            Fetch::Reading(reading) => {
                let appended = match self.sink.as_mut() {
                    Some(sink) => sink.append(&reading),
                    None => Err(SessionError::InvalidState {
                        expected: SessionState::Active,
                        actual: self.state,
                    }),
                };
                if let Err(err) = appended {
                    self.fail(&err);
                    return Err(err);
                }
                info!("received: {reading}");
                self.stats.written += 1;
                Ok(PollOutcome::Recorded)
            }
            Fetch::Skipped(reason) => {
                match &reason {
                    SkipReason::Status(_) => warn!("no data this cycle: {reason}"),
                    // already reported by the transport
                    SkipReason::Network(_) => {}
                    SkipReason::EmptyBody => debug!("no data this cycle: {reason}"),
                }
                self.stats.skipped += 1;
                Ok(PollOutcome::Skipped(reason))
            }
        }
    }

    /// Active -> Stopped, closing the file. No-op in any other state.
    pub fn stop(&mut self) {
        if self.state == SessionState::Active {
            self.sink = None;
            self.state = SessionState::Stopped;
            if let Some(path) = &self.path {
                info!(
                    "logging stopped after {} polls, {} records saved to {}",
                    self.stats.polls,
                    self.stats.written,
                    path.display()
                );
            }
        }
    }

    fn poll_limit_reached(&self) -> bool {
        self.config
            .max_polls
            .is_some_and(|max| self.stats.polls >= max)
    }

    /// Poll until cancelled, the poll limit is hit, or a local I/O error.
    ///
    /// Starts the session first if it is still idle. Cancellation is only
    /// observed between polls, never during a fetch.
    pub fn run(mut self, cancel: &CancelToken) -> SessionReport {
        if self.state == SessionState::Idle {
            if let Err(err) = self.start() {
                return self.finish(Some(err));
            }
        }
        if let Err(err) = self.expect_state(SessionState::Active) {
            return self.finish(Some(err));
        }

        loop {
            if cancel.is_cancelled() {
                debug!("cancellation requested");
                break;
            }
            // also covers a limit of zero: no fetch at all
            if self.poll_limit_reached() {
                debug!("poll limit reached");
                break;
            }
            if let Err(err) = self.poll_once() {
                return self.finish(Some(err));
            }
            if self.poll_limit_reached() {
                debug!("poll limit reached");
                break;
            }
            self.ticker.wait(cancel);
        }

        self.stop();
        self.finish(None)
    }

    /// Close whatever is still open and summarise the session.
    pub fn finish(mut self, failure: Option<SessionError>) -> SessionReport {
        self.stop();
        SessionReport {
            path: self.path.take(),
            state: self.state,
            stats: self.stats,
            started_at: self.started_at,
            ended_at: Local::now(),
            failure,
        }
    }
}
