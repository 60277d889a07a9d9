use crate::command::Opcode;
use crate::status::StatusCode;
use std::io;
use thiserror::Error;

/// The primary error type for the `tfmini-lib` library.
#[derive(Error, Debug)]
pub enum TfminiError {
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("no valid measurement frame before the read deadline")]
    FrameTimeout,

    #[error("measurement frame failed checksum validation")]
    FrameChecksum,

    #[error("no reply to command {0:?} before the command deadline")]
    ReplyTimeout(Opcode),

    #[error("reply to command {0:?} failed checksum validation")]
    ReplyChecksum(Opcode),

    #[error("device reported failure for command {0:?}")]
    CommandRejected(Opcode),

    #[error("invalid frame rate {0}: must be 0, or a divisor of 1000 from the supported set")]
    InvalidFrameRate(u16),
}

impl TfminiError {
    /// Diagnostic status code corresponding to this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            TfminiError::Serial(_) | TfminiError::Io(_) => StatusCode::SerialError,
            TfminiError::FrameTimeout => StatusCode::Timeout,
            TfminiError::FrameChecksum => StatusCode::Checksum,
            TfminiError::ReplyTimeout(_) => StatusCode::Timeout,
            TfminiError::ReplyChecksum(_) => StatusCode::Checksum,
            TfminiError::CommandRejected(_) => StatusCode::Fail,
            TfminiError::InvalidFrameRate(_) => StatusCode::Other,
        }
    }
}
