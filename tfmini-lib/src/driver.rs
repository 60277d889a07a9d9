use crate::command::{self, Command};
use crate::error::TfminiError;
use crate::frame;
use crate::gate::PublicationGate;
use crate::health::{DeviceState, HealthConfig, HealthEvent, HealthMachine, TickPlan};
use crate::status::StatusCode;
use crate::tracker::ErrorRateTracker;
use crate::transport::SerialLink;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Output rates the sensor accepts, in Hz. 0 pauses ranging.
pub const VALID_FRAME_RATES: [u16; 14] = [
    0, 1, 2, 5, 10, 20, 25, 50, 100, 125, 200, 250, 500, 1000,
];

/// Settle time after a reset command before the sensor answers again.
const REBOOT_SETTLE: Duration = Duration::from_millis(50);

pub fn validate_frame_rate(rate: u16) -> Result<(), TfminiError> {
    if VALID_FRAME_RATES.contains(&rate) && (rate == 0 || 1000 % rate == 0) {
        Ok(())
    } else {
        Err(TfminiError::InvalidFrameRate(rate))
    }
}

/// All deadlines and windows in one place so tests can shrink them.
#[derive(Debug, Clone, Copy)]
pub struct TimingConfig {
    /// Budget for finding one measurement frame. The device streams at
    /// 100 Hz by default, so this spans several frame intervals.
    pub read_timeout: Duration,
    /// Budget for a command reply; resets need device-side processing.
    pub command_timeout: Duration,
    /// Rolling window of the error-rate tracker.
    pub error_window: Duration,
    pub health: HealthConfig,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(150),
            command_timeout: Duration::from_secs(1),
            error_window: Duration::from_secs(60),
            health: HealthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    /// Measurement output rate applied at setup and on wake.
    pub frame_rate: u16,
    /// Issue a soft reset before configuring.
    pub soft_reset: bool,
    /// Persist settings to flash after each configuration change.
    pub save_settings: bool,
    pub timing: TimingConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            frame_rate: 100,
            soft_reset: false,
            save_settings: false,
            timing: TimingConfig::default(),
        }
    }
}

/// Driver for the Benewake TFmini Plus over its UART.
///
/// Owns the serial link, the health machine and the publication gate. The
/// host calls [`setup`](Self::setup) once, then [`tick`](Self::tick) at its
/// polling cadence; [`sleep`](Self::sleep) and [`wake`](Self::wake) are
/// one-shot operations. All calls must come from one thread.
pub struct TFminiPlus<L: SerialLink> {
    link: L,
    config: DriverConfig,
    gate: PublicationGate,
    health: HealthMachine,
    tracker: ErrorRateTracker,
    last_status: StatusCode,
}

impl<L: SerialLink> TFminiPlus<L> {
    pub fn new(link: L, config: DriverConfig, gate: PublicationGate) -> Self {
        let now = Instant::now();
        Self {
            link,
            gate,
            health: HealthMachine::new(config.timing.health),
            tracker: ErrorRateTracker::new(config.timing.error_window, now),
            last_status: StatusCode::Ready,
            config,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.health.state()
    }

    pub fn last_status(&self) -> StatusCode {
        self.last_status
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Configure the sensor and prime the health machine. Command failures
    /// are logged and tolerated; the sensor may still come up streaming.
    pub fn setup(&mut self) -> Result<(), TfminiError> {
        validate_frame_rate(self.config.frame_rate)?;
        let now = Instant::now();

        self.link.drain_input()?;

        if self.config.soft_reset {
            match self.send_command(Command::SoftReset) {
                Ok(()) => std::thread::sleep(REBOOT_SETTLE),
                Err(e) => warn!(error = %e, "soft reset failed"),
            }
        }

        if let Err(e) = self.apply_frame_rate(self.config.frame_rate) {
            warn!(rate = self.config.frame_rate, error = %e, "failed to set frame rate");
        }

        // Offline until the first frame proves the sensor is talking.
        info!("TFmini Plus starting offline, waiting for the first frame");
        self.set_status(StatusCode::Offline);
        self.gate.publish_unavailable();
        self.tracker = ErrorRateTracker::new(self.config.timing.error_window, now);
        Ok(())
    }

    /// One scheduler tick at the current wall clock.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// One scheduler tick at `now`. May block up to the read timeout while
    /// looking for a frame; never returns an error — transport faults are
    /// absorbed into the health state and the error tracker.
    pub fn tick_at(&mut self, now: Instant) {
        match self.health.plan_tick(now) {
            TickPlan::Sleep => {
                self.set_status(StatusCode::Sleeping);
                self.gate.publish_unavailable();
                return;
            }
            TickPlan::Skip => return,
            TickPlan::Read => {}
        }

        self.health.begin_read(now);
        let deadline = Instant::now() + self.config.timing.read_timeout;

        match frame::read_frame(&mut self.link, deadline) {
            Ok(reading) => {
                if self.health.frame_received(now) == Some(HealthEvent::CameOnline) {
                    info!("TFmini Plus came online");
                    self.gate.reset_unavailable_latch();
                    self.set_status(StatusCode::Ready);
                }
                self.gate.publish_reading(&reading);
                self.set_status(reading.status.into());
            }
            Err(e) => {
                let code = e.status_code();
                warn!(error = %e, "failed to read measurement frame");
                self.set_status(code);
                if let Some(report) = self.tracker.record(code, now) {
                    warn!(
                        count = report.count,
                        last_status = %report.last_status,
                        "frame errors in the last minute"
                    );
                }
            }
        }

        if let Some(HealthEvent::WentOffline(code)) = self.health.check_offline(now, self.last_status)
        {
            warn!(status = %code, "TFmini Plus marked offline");
            self.set_status(code);
            self.gate.publish_unavailable();
        }
    }

    /// Stop active ranging by setting the frame rate to 0.
    pub fn sleep(&mut self) -> Result<(), TfminiError> {
        info!("putting TFmini Plus to sleep (frame rate 0)");
        if let Err(e) = self.send_command(Command::SetFrameRate(0)) {
            warn!(error = %e, "sleep command failed");
            return Err(e);
        }
        self.health.note_sleep();
        self.gate.reset_unavailable_latch();
        self.set_status(StatusCode::Sleeping);
        self.gate.publish_unavailable();
        Ok(())
    }

    /// Resume ranging at the configured frame rate.
    pub fn wake(&mut self) -> Result<(), TfminiError> {
        self.wake_at(Instant::now())
    }

    /// Resume ranging, opening the wake grace window at `now`.
    pub fn wake_at(&mut self, now: Instant) -> Result<(), TfminiError> {
        info!(rate = self.config.frame_rate, "waking TFmini Plus");
        if let Err(e) = self.apply_frame_rate(self.config.frame_rate) {
            warn!(error = %e, "wake command failed");
            return Err(e);
        }
        self.health.note_wake(now);
        self.gate.reset_unavailable_latch();
        self.set_status(StatusCode::Ready);
        Ok(())
    }

    /// Request a single measurement while output is paused.
    pub fn trigger_detection(&mut self) -> Result<(), TfminiError> {
        self.send_command(Command::TriggerDetection)
    }

    /// Send one command, bounded by the command timeout, and record the
    /// outcome status. Not auto-retried.
    pub fn send_command(&mut self, cmd: Command) -> Result<(), TfminiError> {
        let deadline = Instant::now() + self.config.timing.command_timeout;
        match command::send_command(&mut self.link, cmd, deadline) {
            Ok(()) => {
                self.set_status(StatusCode::Pass);
                Ok(())
            }
            Err(e) => {
                warn!(command = ?cmd, error = %e, "command failed");
                self.set_status(e.status_code());
                Err(e)
            }
        }
    }

    fn apply_frame_rate(&mut self, rate: u16) -> Result<(), TfminiError> {
        self.send_command(Command::SetFrameRate(rate))?;
        if self.config.save_settings {
            if let Err(e) = self.send_command(Command::SaveSettings) {
                warn!(error = %e, "failed to save settings");
            }
        }
        Ok(())
    }

    fn set_status(&mut self, code: StatusCode) {
        self.last_status = code;
        self.gate.record_status(code);
    }
}
