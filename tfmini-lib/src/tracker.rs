use crate::status::StatusCode;
use std::time::{Duration, Instant};

/// One rate-limited diagnostic report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorReport {
    /// Failures recorded in the current window.
    pub count: u32,
    /// Status of the failure that produced this report.
    pub last_status: StatusCode,
}

/// Rolling error counter that bounds diagnostic volume to one report per
/// window, however many reads fail. A disconnected sensor timing out on
/// every retry produces one line a minute, not one per attempt.
#[derive(Debug)]
pub struct ErrorRateTracker {
    window: Duration,
    window_start: Instant,
    count: u32,
    last_report: Instant,
}

impl ErrorRateTracker {
    pub fn new(window: Duration, now: Instant) -> Self {
        Self {
            window,
            window_start: now,
            count: 0,
            last_report: now,
        }
    }

    /// Count one failure. Returns a report when one is due, at most once
    /// per window; crossing the window boundary drops the old count.
    pub fn record(&mut self, status: StatusCode, now: Instant) -> Option<ErrorReport> {
        if now.duration_since(self.window_start) > self.window {
            self.window_start = now;
            self.count = 0;
        }
        self.count += 1;

        if now.duration_since(self.last_report) >= self.window {
            self.last_report = now;
            return Some(ErrorReport {
                count: self.count,
                last_status: status,
            });
        }
        None
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}
