//! Sleep and wall-clock access, injectable so timing logic can be tested
//! without real delays.

use std::thread;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};

/// Source of blocking delays and local wall-clock time.
pub trait Clock {
    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);

    /// Current local wall-clock time.
    fn now(&self) -> NaiveDateTime;
}

/// The real clock: `thread::sleep` and the system's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }

    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
