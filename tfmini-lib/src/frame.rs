use crate::error::TfminiError;
use crate::status::StatusCode;
use crate::transport::SerialLink;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use zerocopy::byteorder::little_endian::I16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Total size of a measurement frame on the wire, checksum included.
pub const FRAME_SIZE: usize = 9;

/// Every measurement frame opens with these two bytes.
pub const FRAME_HEADER: [u8; 2] = [0x59, 0x59];

/// Wait between availability polls while the receive buffer is empty.
const IDLE_WAIT: Duration = Duration::from_millis(1);

/// Low byte of the sum of `bytes`, the checksum rule shared by measurement
/// frames, command frames and command replies.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().map(|&b| b as u16).sum::<u16>() as u8
}

/// Wire layout of one measurement frame.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct RawFrame {
    pub header: [u8; 2],  // always 0x59 0x59
    pub distance_cm: I16, // -1: too weak, -4: flooded
    pub strength: I16,    // -1: saturated
    pub raw_temp: I16,    // (raw >> 3) - 256 gives Celsius
    pub checksum: u8,
}

/// Sensor-reported condition attached to a decoded frame, or the reason a
/// decode attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasurementStatus {
    /// Valid measurement.
    Ok,
    /// Return signal too weak to range (`distance_cm == -1`).
    WeakSignal,
    /// Return signal saturated the receiver (`strength == -1`).
    StrongSignal,
    /// Ambient light flooded the receiver (`distance_cm == -4`).
    FloodLight,
    /// No valid frame header found before the deadline.
    HeaderSyncFailed,
    /// A candidate frame was found but its checksum did not match.
    ChecksumFailed,
}

impl From<MeasurementStatus> for StatusCode {
    fn from(status: MeasurementStatus) -> Self {
        match status {
            MeasurementStatus::Ok => StatusCode::Ready,
            MeasurementStatus::WeakSignal => StatusCode::WeakSignal,
            MeasurementStatus::StrongSignal => StatusCode::StrongSignal,
            MeasurementStatus::FloodLight => StatusCode::FloodLight,
            MeasurementStatus::HeaderSyncFailed => StatusCode::HeaderSync,
            MeasurementStatus::ChecksumFailed => StatusCode::Checksum,
        }
    }
}

/// One decoded measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementReading {
    pub distance_cm: i16,
    pub strength: i16,
    pub temperature_c: i16,
    pub status: MeasurementStatus,
}

impl From<&RawFrame> for MeasurementReading {
    fn from(raw: &RawFrame) -> Self {
        let distance_cm = raw.distance_cm.get();
        let strength = raw.strength.get();
        // Chip temperature register: 1/8 degree steps offset by 256.
        let temperature_c = (raw.raw_temp.get() >> 3) - 256;

        let status = if distance_cm == -1 {
            MeasurementStatus::WeakSignal
        } else if strength == -1 {
            MeasurementStatus::StrongSignal
        } else if distance_cm == -4 {
            MeasurementStatus::FloodLight
        } else {
            MeasurementStatus::Ok
        };

        MeasurementReading {
            distance_cm,
            strength,
            temperature_c,
            status,
        }
    }
}

/// Incremental frame synchronizer.
///
/// Bytes are shifted through a fixed window of the last [`FRAME_SIZE`] seen;
/// whenever the window opens with the header pair it is treated as a
/// candidate frame and checksum-validated. The window lives only for one
/// decode attempt.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    window: [u8; FRAME_SIZE],
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift one byte into the window. Returns `None` while still searching
    /// for a frame, `Some(Ok(..))` on a validated frame, and
    /// `Some(Err(FrameChecksum))` when a candidate frame is corrupt — the
    /// attempt is over either way.
    pub fn push(&mut self, byte: u8) -> Option<Result<MeasurementReading, TfminiError>> {
        self.window.copy_within(1.., 0);
        self.window[FRAME_SIZE - 1] = byte;

        if self.window[..2] != FRAME_HEADER {
            return None;
        }

        if checksum(&self.window[..FRAME_SIZE - 1]) != self.window[FRAME_SIZE - 1] {
            return Some(Err(TfminiError::FrameChecksum));
        }

        let raw: &RawFrame = zerocopy::transmute_ref!(&self.window);
        Some(Ok(MeasurementReading::from(raw)))
    }
}

/// Pull bytes from `link` until one valid frame decodes or `deadline`
/// passes. An empty receive buffer yields briefly rather than failing;
/// no byte is ever re-read.
pub fn read_frame<L: SerialLink + ?Sized>(
    link: &mut L,
    deadline: Instant,
) -> Result<MeasurementReading, TfminiError> {
    let mut decoder = FrameDecoder::new();

    while Instant::now() < deadline {
        if link.bytes_available()? == 0 {
            std::thread::sleep(IDLE_WAIT);
            continue;
        }

        let Some(byte) = link.read_byte()? else {
            continue;
        };

        match decoder.push(byte) {
            Some(Ok(reading)) => return Ok(reading),
            Some(Err(e)) => return Err(e),
            None => {}
        }
    }

    Err(TfminiError::FrameTimeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_frame(distance_cm: i16, strength: i16, raw_temp: i16) -> [u8; FRAME_SIZE] {
        let mut frame = [0u8; FRAME_SIZE];
        frame[..2].copy_from_slice(&FRAME_HEADER);
        frame[2..4].copy_from_slice(&distance_cm.to_le_bytes());
        frame[4..6].copy_from_slice(&strength.to_le_bytes());
        frame[6..8].copy_from_slice(&raw_temp.to_le_bytes());
        frame[8] = checksum(&frame[..8]);
        frame
    }

    fn decode(bytes: &[u8]) -> Option<Result<MeasurementReading, TfminiError>> {
        let mut decoder = FrameDecoder::new();
        for &b in bytes {
            if let Some(outcome) = decoder.push(b) {
                return Some(outcome);
            }
        }
        None
    }

    #[test]
    fn checksum_is_low_byte_of_sum() {
        assert_eq!(checksum(&[0x59, 0x59]), 0xB2);
        assert_eq!(checksum(&[0xFF, 0xFF, 0x03]), 0x01);
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn decodes_clean_frame() {
        let frame = build_frame(123, 456, 0x0900);
        let reading = decode(&frame).unwrap().unwrap();
        assert_eq!(reading.distance_cm, 123);
        assert_eq!(reading.strength, 456);
        assert_eq!(reading.status, MeasurementStatus::Ok);
    }

    #[test]
    fn decodes_frame_after_noise_prefix() {
        // Lone 0x59s in the noise never pair up into a false header.
        let mut stream = vec![0x00, 0x59, 0x12, 0xFF, 0x59, 0x01];
        stream.extend_from_slice(&build_frame(250, 1000, 0x0800));
        let reading = decode(&stream).unwrap().unwrap();
        assert_eq!(reading.distance_cm, 250);
    }

    #[test]
    fn false_header_pair_in_noise_aborts_attempt() {
        // A 0x59 0x59 pair inside noise forms a candidate frame whose
        // checksum fails, ending the attempt.
        let mut stream = vec![0x59, 0x59];
        stream.extend_from_slice(&build_frame(250, 1000, 0x0800));
        assert!(matches!(
            decode(&stream),
            Some(Err(TfminiError::FrameChecksum))
        ));
    }

    #[test]
    fn corrupt_byte_fails_checksum() {
        let mut frame = build_frame(300, 200, 0x0800);
        frame[4] ^= 0x40;
        assert!(matches!(
            decode(&frame),
            Some(Err(TfminiError::FrameChecksum))
        ));
    }

    #[test]
    fn temperature_decode_is_exact() {
        let reading = decode(&build_frame(10, 10, 0x0800)).unwrap().unwrap();
        assert_eq!(reading.temperature_c, 0);

        // 2248 >> 3 - 256 = 25
        let reading = decode(&build_frame(10, 10, 2248)).unwrap().unwrap();
        assert_eq!(reading.temperature_c, 25);
    }

    #[test]
    fn saturation_values_classify() {
        let weak = decode(&build_frame(-1, 50, 0x0800)).unwrap().unwrap();
        assert_eq!(weak.status, MeasurementStatus::WeakSignal);

        let strong = decode(&build_frame(30, -1, 0x0800)).unwrap().unwrap();
        assert_eq!(strong.status, MeasurementStatus::StrongSignal);

        let flood = decode(&build_frame(-4, 50, 0x0800)).unwrap().unwrap();
        assert_eq!(flood.status, MeasurementStatus::FloodLight);
    }

    #[test]
    fn incomplete_frame_keeps_searching() {
        let frame = build_frame(77, 88, 0x0800);
        assert!(decode(&frame[..FRAME_SIZE - 1]).is_none());
    }
}
