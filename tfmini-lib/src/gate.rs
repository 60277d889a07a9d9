use crate::frame::{MeasurementReading, MeasurementStatus};
use crate::status::StatusCode;
use tracing::warn;

/// A numeric sink accepting either a value or an "unavailable" marker.
/// Implemented by the host for distance, signal strength and temperature.
pub trait MeasurementSink {
    fn publish(&mut self, value: f32);
    fn publish_unavailable(&mut self);
}

/// Textual sink for the diagnostic status code.
pub trait StatusSink {
    fn publish(&mut self, status: &str);
}

/// Minimum change required before a value is forwarded again.
#[derive(Debug, Clone, Copy)]
pub struct ChangeThresholds {
    pub distance_cm: f32,
    pub strength: f32,
    pub temperature_c: f32,
}

impl Default for ChangeThresholds {
    fn default() -> Self {
        Self {
            distance_cm: 0.1,
            strength: 1.0,
            temperature_c: 0.05,
        }
    }
}

#[derive(Default)]
struct Channel {
    sink: Option<Box<dyn MeasurementSink>>,
    last: Option<f32>,
}

impl Channel {
    fn publish(&mut self, value: f32, threshold: f32) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let changed = match self.last {
            None => true,
            Some(last) => (value - last).abs() >= threshold,
        };
        if changed {
            sink.publish(value);
            self.last = Some(value);
        }
    }

    fn publish_unavailable(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            sink.publish_unavailable();
        }
        self.last = None;
    }
}

/// Decides what actually reaches the sinks: small changes are suppressed
/// per-channel, "unavailable" is emitted once per outage, and status text
/// is published only when it changes.
#[derive(Default)]
pub struct PublicationGate {
    distance: Channel,
    strength: Channel,
    temperature: Channel,
    status: Option<Box<dyn StatusSink>>,
    thresholds: ChangeThresholds,
    published_unavailable: bool,
    last_published_status: Option<StatusCode>,
}

impl PublicationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(mut self, thresholds: ChangeThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_distance_sink(mut self, sink: Box<dyn MeasurementSink>) -> Self {
        self.distance.sink = Some(sink);
        self
    }

    pub fn with_strength_sink(mut self, sink: Box<dyn MeasurementSink>) -> Self {
        self.strength.sink = Some(sink);
        self
    }

    pub fn with_temperature_sink(mut self, sink: Box<dyn MeasurementSink>) -> Self {
        self.temperature.sink = Some(sink);
        self
    }

    pub fn with_status_sink(mut self, sink: Box<dyn StatusSink>) -> Self {
        self.status = Some(sink);
        self
    }

    /// Forward one decoded reading. Anomalous readings (weak/strong/flood)
    /// push the channels to unavailable while the device itself stays
    /// online; the caller records the matching status code.
    pub fn publish_reading(&mut self, reading: &MeasurementReading) {
        self.published_unavailable = false;

        if reading.status != MeasurementStatus::Ok {
            warn!(status = %StatusCode::from(reading.status), "measurement flagged");
            self.publish_unavailable();
            return;
        }

        self.distance
            .publish(reading.distance_cm as f32, self.thresholds.distance_cm);
        self.strength
            .publish(reading.strength as f32, self.thresholds.strength);
        self.temperature
            .publish(reading.temperature_c as f32, self.thresholds.temperature_c);
    }

    /// Emit the unavailable marker on every channel, once per outage.
    pub fn publish_unavailable(&mut self) {
        if self.published_unavailable {
            return;
        }
        self.published_unavailable = true;

        self.distance.publish_unavailable();
        self.strength.publish_unavailable();
        self.temperature.publish_unavailable();
    }

    /// Re-arm the unavailable latch so the next outage emits again. Called
    /// on online/sleep/wake transitions.
    pub fn reset_unavailable_latch(&mut self) {
        self.published_unavailable = false;
    }

    /// Publish a status string, de-duplicated against the last one sent.
    pub fn record_status(&mut self, code: StatusCode) {
        if self.last_published_status == Some(code) {
            return;
        }
        if let Some(sink) = self.status.as_mut() {
            sink.publish(&code.to_string());
        }
        self.last_published_status = Some(code);
    }
}
