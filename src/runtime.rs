use std::cell::Cell;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use signal_hook::consts::{SIGINT, SIGTERM};

/// Upper bound on how long a wait goes without looking at the cancel flag
const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(50);

/// Exit status used when an interrupt arrives while nothing is being logged
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Cooperative stop request shared between the signal handler and a session
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Route SIGINT/SIGTERM into `token`.
///
/// While the token is clear (a session is running) a signal only sets it, so
/// the session stops at its next iteration boundary. While the token is
/// already set (idle at the menu) a signal terminates the process.
pub fn install_interrupt_handler(token: &CancelToken) -> io::Result<()> {
    for signal in [SIGINT, SIGTERM] {
        // Order matters: the shutdown check must observe the flag before it is set.
        signal_hook::flag::register_conditional_shutdown(
            signal,
            INTERRUPTED_EXIT_CODE,
            Arc::clone(&token.flag),
        )?;
        signal_hook::flag::register(signal, Arc::clone(&token.flag))?;
    }
    Ok(())
}

/// Poll cadence, decoupled from the fetch/write logic
pub trait Ticker {
    fn interval(&self) -> Duration;

    /// Block until the next poll is due or `cancel` is raised.
    fn wait(&self, cancel: &CancelToken);
}

/// Wall-clock ticker sleeping a fixed interval between polls
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }

    fn wait(&self, cancel: &CancelToken) {
        let deadline = Instant::now() + self.interval;
        loop {
            if cancel.is_cancelled() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            std::thread::sleep((deadline - now).min(CANCEL_CHECK_SLICE));
        }
    }
}

/// Virtual clock for headless runs: waits return immediately and only count.
///
/// Optionally raises the cancel token every `n` waits, standing in for an
/// operator pressing Ctrl+C after `n` poll intervals.
#[derive(Debug)]
pub struct ManualTicker {
    interval: Duration,
    cancel_every: Option<u64>,
    waits: Cell<u64>,
}

impl ManualTicker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            cancel_every: None,
            waits: Cell::new(0),
        }
    }

    pub fn cancelling_every(interval: Duration, waits: u64) -> Self {
        Self {
            interval,
            cancel_every: Some(waits.max(1)),
            waits: Cell::new(0),
        }
    }

    pub fn waits(&self) -> u64 {
        self.waits.get()
    }

    /// Time that would have passed on a wall clock
    pub fn elapsed(&self) -> Duration {
        let waits = u32::try_from(self.waits.get()).unwrap_or(u32::MAX);
        self.interval.saturating_mul(waits)
    }
}

impl Ticker for ManualTicker {
    fn interval(&self) -> Duration {
        self.interval
    }

    fn wait(&self, cancel: &CancelToken) {
        let waits = self.waits.get() + 1;
        self.waits.set(waits);
        if let Some(every) = self.cancel_every {
            if waits % every == 0 {
                cancel.cancel();
            }
        }
    }
}
