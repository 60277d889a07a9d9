use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Diagnostic status codes surfaced through the status text sink.
///
/// These are observability only: nothing in the driver branches on a
/// previously recorded status. The display strings are the exact tokens
/// published to the text sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Default, Serialize, Deserialize)]
pub enum StatusCode {
    #[default]
    #[strum(to_string = "READY")]
    Ready,
    #[strum(to_string = "SERIAL")]
    SerialError,
    #[strum(to_string = "HEADER")]
    HeaderSync,
    #[strum(to_string = "CHECKSUM")]
    Checksum,
    #[strum(to_string = "TIMEOUT")]
    Timeout,
    #[strum(to_string = "PASS")]
    Pass,
    #[strum(to_string = "FAIL")]
    Fail,
    #[strum(to_string = "I2CREAD")]
    I2cRead,
    #[strum(to_string = "I2CWRITE")]
    I2cWrite,
    #[strum(to_string = "I2CLENGTH")]
    I2cLength,
    #[strum(to_string = "WEAK")]
    WeakSignal,
    #[strum(to_string = "STRONG")]
    StrongSignal,
    #[strum(to_string = "FLOOD")]
    FloodLight,
    #[strum(to_string = "MEASURE")]
    Measure,
    #[strum(to_string = "OFFLINE")]
    Offline,
    #[strum(to_string = "SLEEPING")]
    Sleeping,
    #[strum(to_string = "OTHER")]
    Other,
}
