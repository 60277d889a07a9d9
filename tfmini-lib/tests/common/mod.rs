//! Common test utilities: an in-memory serial link and wire-frame builders.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[allow(unused_imports)]
pub use tfmini_lib::error::TfminiError;
#[allow(unused_imports)]
pub use tfmini_lib::frame::{FRAME_HEADER, FRAME_SIZE, MeasurementStatus, checksum};
#[allow(unused_imports)]
pub use tfmini_lib::status::StatusCode;
use tfmini_lib::gate::{MeasurementSink, StatusSink};
use tfmini_lib::transport::SerialLink;

/// Route driver logs through the test harness when RUST_LOG is set.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
struct Inner {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    /// Pre-scripted device replies, one popped into `rx` per write.
    replies: VecDeque<Vec<u8>>,
    drains: usize,
}

/// In-memory stand-in for the sensor's UART. Cloning shares the buffers,
/// so tests keep a handle while the driver owns its copy.
#[derive(Clone, Default)]
pub struct MockLink(Rc<RefCell<Inner>>);

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_rx(&self, bytes: &[u8]) {
        self.0.borrow_mut().rx.extend(bytes);
    }

    /// Queue a device reply to be delivered on the next outbound write.
    pub fn script_reply(&self, reply: Vec<u8>) {
        self.0.borrow_mut().replies.push_back(reply);
    }

    #[allow(dead_code)]
    pub fn written(&self) -> Vec<u8> {
        self.0.borrow().tx.clone()
    }

    #[allow(dead_code)]
    pub fn clear_written(&self) {
        self.0.borrow_mut().tx.clear();
    }

    #[allow(dead_code)]
    pub fn drain_count(&self) -> usize {
        self.0.borrow().drains
    }

    #[allow(dead_code)]
    pub fn rx_len(&self) -> usize {
        self.0.borrow().rx.len()
    }
}

impl SerialLink for MockLink {
    fn bytes_available(&mut self) -> Result<usize, TfminiError> {
        Ok(self.0.borrow().rx.len())
    }

    fn read_byte(&mut self) -> Result<Option<u8>, TfminiError> {
        Ok(self.0.borrow_mut().rx.pop_front())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TfminiError> {
        let mut inner = self.0.borrow_mut();
        inner.tx.extend_from_slice(bytes);
        if let Some(reply) = inner.replies.pop_front() {
            inner.rx.extend(reply);
        }
        Ok(())
    }

    fn drain_input(&mut self) -> Result<(), TfminiError> {
        let mut inner = self.0.borrow_mut();
        inner.rx.clear();
        inner.drains += 1;
        Ok(())
    }
}

/// Build a valid measurement frame.
pub fn frame_bytes(distance_cm: i16, strength: i16, raw_temp: i16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_SIZE);
    frame.extend_from_slice(&FRAME_HEADER);
    frame.extend_from_slice(&distance_cm.to_le_bytes());
    frame.extend_from_slice(&strength.to_le_bytes());
    frame.extend_from_slice(&raw_temp.to_le_bytes());
    frame.push(checksum(&frame));
    frame
}

/// Acknowledge reply (soft/hard reset, save settings): 5 bytes, pass/fail
/// flag at byte 3.
#[allow(dead_code)]
pub fn ack_reply(opcode: u8, flag: u8) -> Vec<u8> {
    let mut reply = vec![0x5A, 0x05, opcode, flag];
    reply.push(checksum(&reply));
    reply
}

/// Reply to a set-frame-rate command, echoing the rate.
#[allow(dead_code)]
pub fn rate_reply(rate: u16) -> Vec<u8> {
    let mut reply = vec![0x5A, 0x06, 0x03];
    reply.extend_from_slice(&rate.to_le_bytes());
    reply.push(checksum(&reply));
    reply
}

#[derive(Debug, Clone, PartialEq)]
#[allow(dead_code)]
pub enum SinkEvent {
    Value(f32),
    Unavailable,
}

/// Records everything published to a numeric sink.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct RecordingSink(pub Rc<RefCell<Vec<SinkEvent>>>);

impl MeasurementSink for RecordingSink {
    fn publish(&mut self, value: f32) {
        self.0.borrow_mut().push(SinkEvent::Value(value));
    }
    fn publish_unavailable(&mut self) {
        self.0.borrow_mut().push(SinkEvent::Unavailable);
    }
}

/// Records every status string published.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct RecordingStatusSink(pub Rc<RefCell<Vec<String>>>);

impl StatusSink for RecordingStatusSink {
    fn publish(&mut self, status: &str) {
        self.0.borrow_mut().push(status.to_string());
    }
}
