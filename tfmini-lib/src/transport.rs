use crate::error::TfminiError;
use serialport::{ClearBuffer, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;

/// Factory-default baud rate of the TFmini Plus.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Per-call timeout on the underlying port. The driver does its own
/// deadline handling above this, so this only bounds a single syscall.
const PORT_TIMEOUT: Duration = Duration::from_millis(10);

/// Byte-level access to the sensor's UART.
///
/// The driver is written against this trait so tests can substitute an
/// in-memory link; `Box<dyn SerialPort>` is the production implementation.
pub trait SerialLink {
    /// Number of bytes currently waiting in the receive buffer.
    fn bytes_available(&mut self) -> Result<usize, TfminiError>;

    /// Read one byte, returning `None` when nothing arrived in time.
    fn read_byte(&mut self) -> Result<Option<u8>, TfminiError>;

    /// Write the whole buffer out.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TfminiError>;

    /// Discard everything waiting in the receive buffer.
    fn drain_input(&mut self) -> Result<(), TfminiError>;
}

impl SerialLink for Box<dyn SerialPort> {
    fn bytes_available(&mut self) -> Result<usize, TfminiError> {
        Ok(self.bytes_to_read()? as usize)
    }

    fn read_byte(&mut self) -> Result<Option<u8>, TfminiError> {
        let mut byte = [0u8; 1];
        match self.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TfminiError> {
        Write::write_all(self, bytes)?;
        self.flush()?;
        Ok(())
    }

    fn drain_input(&mut self) -> Result<(), TfminiError> {
        self.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

/// Open a serial port configured for the sensor.
pub fn open(path: &str, baud: u32) -> Result<Box<dyn SerialPort>, TfminiError> {
    let port = serialport::new(path, baud).timeout(PORT_TIMEOUT).open()?;
    Ok(port)
}
