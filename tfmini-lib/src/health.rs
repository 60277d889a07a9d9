use crate::status::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Connection state of the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    Online,
    Offline,
    Sleeping,
}

/// Timing knobs for the health machine. Defaults match the device's
/// behavior at its nominal 100 Hz output rate; tests shrink them.
#[derive(Debug, Clone, Copy)]
pub struct HealthConfig {
    /// Minimum spacing between read attempts while offline.
    pub retry_interval: Duration,
    /// Silence tolerated before declaring the device offline.
    pub offline_timeout: Duration,
    /// Relaxed silence tolerance inside the wake grace window.
    pub wake_offline_timeout: Duration,
    /// Length of the wake grace window.
    pub wake_grace: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(60),
            offline_timeout: Duration::from_secs(1),
            wake_offline_timeout: Duration::from_secs(5),
            wake_grace: Duration::from_secs(5),
        }
    }
}

/// Timers the health machine reasons over. Never persisted; every start
/// begins offline with an empty context, waiting for the first frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthContext {
    pub last_good_frame: Option<Instant>,
    pub last_retry: Option<Instant>,
    pub wake_grace_until: Option<Instant>,
}

/// What this tick should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPlan {
    /// Device is sleeping: report so, attempt nothing.
    Sleep,
    /// Offline and still inside the retry backoff: do nothing.
    Skip,
    /// Attempt to read a frame.
    Read,
}

/// State transition produced by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEvent {
    CameOnline,
    WentOffline(StatusCode),
}

/// Tracks online/offline/sleeping state, retry backoff and the wake grace
/// window. Pure over `Instant`s handed in by the caller, so the whole
/// offline/retry/wake logic tests without I/O or real waiting.
#[derive(Debug)]
pub struct HealthMachine {
    state: DeviceState,
    ctx: HealthContext,
    cfg: HealthConfig,
}

impl HealthMachine {
    pub fn new(cfg: HealthConfig) -> Self {
        Self {
            state: DeviceState::Offline,
            ctx: HealthContext::default(),
            cfg,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn context(&self) -> &HealthContext {
        &self.ctx
    }

    pub fn in_wake_grace(&self, now: Instant) -> bool {
        self.ctx.wake_grace_until.is_some_and(|until| now <= until)
    }

    /// Decide what this tick does. While offline, reads are throttled to
    /// one per retry interval unless the wake grace window is open.
    pub fn plan_tick(&self, now: Instant) -> TickPlan {
        match self.state {
            DeviceState::Sleeping => TickPlan::Sleep,
            DeviceState::Offline if !self.in_wake_grace(now) => {
                match self.ctx.last_retry {
                    Some(last) if now.duration_since(last) < self.cfg.retry_interval => {
                        TickPlan::Skip
                    }
                    _ => TickPlan::Read,
                }
            }
            _ => TickPlan::Read,
        }
    }

    /// Record that a read attempt is starting now.
    pub fn begin_read(&mut self, now: Instant) {
        self.ctx.last_retry = Some(now);
    }

    /// Record a validated frame. Returns `CameOnline` on the transition
    /// out of offline.
    pub fn frame_received(&mut self, now: Instant) -> Option<HealthEvent> {
        self.ctx.last_good_frame = Some(now);
        if self.state != DeviceState::Online {
            self.state = DeviceState::Online;
            return Some(HealthEvent::CameOnline);
        }
        None
    }

    /// Evaluate the offline rule after a read attempt. `trigger` is the
    /// most recent diagnostic status; it is recorded on the transition and
    /// decides whether the retry backoff resets.
    pub fn check_offline(&mut self, now: Instant, trigger: StatusCode) -> Option<HealthEvent> {
        let threshold = if self.in_wake_grace(now) {
            self.cfg.wake_offline_timeout
        } else {
            self.cfg.offline_timeout
        };

        let silent = match self.ctx.last_good_frame {
            None => true,
            Some(last) => now.duration_since(last) > threshold,
        };
        if !silent || self.state == DeviceState::Offline {
            return None;
        }

        self.state = DeviceState::Offline;
        // A timeout-triggered declaration retries on the very next tick, as
        // does anything inside the wake grace window.
        if self.in_wake_grace(now) || trigger == StatusCode::Timeout {
            self.ctx.last_retry = None;
        }
        Some(HealthEvent::WentOffline(trigger))
    }

    /// Record a successful sleep command.
    pub fn note_sleep(&mut self) {
        self.state = DeviceState::Sleeping;
    }

    /// Record a successful wake command: back to offline awaiting the first
    /// frame, with the backoff cleared and the grace window open.
    pub fn note_wake(&mut self, now: Instant) {
        self.state = DeviceState::Offline;
        self.ctx.last_retry = None;
        self.ctx.wake_grace_until = Some(now + self.cfg.wake_grace);
    }
}
