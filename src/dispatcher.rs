use std::io::{self, BufRead, Write};

use crate::runtime::{CancelToken, Ticker};
use crate::session::{PollingSession, SessionConfig, SessionReport, SessionState};
use crate::transport::Transport;

const MENU: &str = "\nMenu:\n\
                    1. Start logging MPU6050 data\n\
                    2. Delete logs on ESP32 and reset count\n\
                    3. Exit\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    StartSession,
    ResetRemote,
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::StartSession),
            "2" => Some(MenuChoice::ResetRemote),
            "3" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

/// Interactive read-choice-act loop on top of one transport and ticker.
///
/// Starting a session blocks until it is stopped or fails. The cancel token
/// is left raised whenever no session runs, so an interrupt at the menu is
/// not mistaken for a stop request aimed at the next session.
pub struct Dispatcher<'a, T: Transport + ?Sized, K: Ticker + ?Sized> {
    transport: &'a T,
    ticker: &'a K,
    session_config: SessionConfig,
    cancel: CancelToken,
}

impl<'a, T: Transport + ?Sized, K: Ticker + ?Sized> Dispatcher<'a, T, K> {
    pub fn new(
        transport: &'a T,
        ticker: &'a K,
        session_config: SessionConfig,
        cancel: CancelToken,
    ) -> Self {
        cancel.cancel();
        Self {
            transport,
            ticker,
            session_config,
            cancel,
        }
    }

    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, mut out: W) -> io::Result<()> {
        loop {
            write!(out, "{MENU}Enter your choice: ")?;
            out.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(out)?;
                writeln!(out, "Exiting program.")?;
                return Ok(());
            }

            match MenuChoice::parse(&line) {
                Some(MenuChoice::StartSession) => {
                    self.start_session(&mut out)?;
                }
                Some(MenuChoice::ResetRemote) => {
                    self.reset_remote(&mut out)?;
                }
                Some(MenuChoice::Exit) => {
                    writeln!(out, "Exiting program.")?;
                    return Ok(());
                }
                None => writeln!(out, "Invalid choice. Please enter 1, 2, or 3.")?,
            }
        }
    }

    pub fn start_session<W: Write>(&mut self, out: &mut W) -> io::Result<SessionReport> {
        self.cancel.reset();
        let mut session =
            PollingSession::new(self.transport, self.ticker, self.session_config.clone());

        let report = match session.start() {
            Ok(path) => {
                writeln!(
                    out,
                    "Logging live MPU6050 data to {}... Press Ctrl+C to stop.",
                    path.display()
                )?;
                out.flush()?;
                session.run(&self.cancel)
            }
            Err(err) => session.finish(Some(err)),
        };
        // idle again: the next interrupt terminates instead of stopping a session
        self.cancel.cancel();

        match (&report.state, &report.path, &report.failure) {
            (SessionState::Failed, _, Some(err)) => {
                writeln!(out, "Logging failed: {err}")?;
                if let Some(path) = &report.path {
                    writeln!(out, "Partial data kept in {}", path.display())?;
                }
            }
            (_, Some(path), _) => {
                writeln!(out)?;
                writeln!(
                    out,
                    "Logging stopped. {} records saved to {} ({} elapsed)",
                    report.stats.written,
                    path.display(),
                    report.duration_text()
                )?;
            }
            _ => writeln!(out, "Logging ended without a log file.")?,
        }

        Ok(report)
    }

    /// Local log files are never touched; only the board's buffer is cleared.
    pub fn reset_remote<W: Write>(&self, out: &mut W) -> io::Result<bool> {
        let acknowledged = self.transport.reset_remote();
        if acknowledged {
            writeln!(out, "Logs deleted on ESP32 and reset.")?;
        } else {
            writeln!(out, "Reset was not acknowledged by the ESP32; try again.")?;
        }
        Ok(acknowledged)
    }
}
