use crate::error::TfminiError;
use crate::frame::checksum;
use crate::transport::SerialLink;
use bytes::{BufMut, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Command and reply frames both open with this byte.
pub const COMMAND_HEADER: u8 = 0x5A;

/// Longest reply any command produces (set baud rate).
pub const REPLY_MAX: usize = 8;

/// Byte offset of the pass/fail flag in an acknowledge reply.
const ACK_FLAG_OFFSET: usize = 3;

const IDLE_WAIT: Duration = Duration::from_millis(1);

/// Opcode byte of each supported command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    SoftReset = 0x02,
    SetFrameRate = 0x03,
    TriggerDetection = 0x04,
    SetBaudRate = 0x06,
    HardReset = 0x10,
    SaveSettings = 0x11,
}

/// Width of the little-endian parameter field, when a command carries one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamWidth {
    None,
    U16,
    U32,
}

/// Constant per-command framing facts. Lengths are fixed by the protocol,
/// never derived from bytes on the wire.
#[derive(Debug, Clone, Copy)]
pub struct CommandDescriptor {
    pub opcode: Opcode,
    /// Total command frame length, checksum included.
    pub command_len: usize,
    /// Total reply frame length; 0 means the command is fire-and-forget.
    pub reply_len: usize,
    pub param: ParamWidth,
    /// Whether the reply carries a pass/fail flag at byte 3.
    pub acknowledged: bool,
}

/// One configuration command, parameter included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Reboot the sensor firmware, keeping settings.
    SoftReset,
    /// Restore factory settings and reboot.
    HardReset,
    /// Set the measurement output rate in Hz; 0 pauses ranging.
    SetFrameRate(u16),
    /// Switch the UART baud rate.
    SetBaudRate(u32),
    /// Persist the current settings to flash.
    SaveSettings,
    /// Request a single measurement while output is paused.
    TriggerDetection,
}

impl Command {
    pub fn descriptor(&self) -> CommandDescriptor {
        match self {
            Command::SoftReset => CommandDescriptor {
                opcode: Opcode::SoftReset,
                command_len: 4,
                reply_len: 5,
                param: ParamWidth::None,
                acknowledged: true,
            },
            Command::HardReset => CommandDescriptor {
                opcode: Opcode::HardReset,
                command_len: 4,
                reply_len: 5,
                param: ParamWidth::None,
                acknowledged: true,
            },
            Command::SetFrameRate(_) => CommandDescriptor {
                opcode: Opcode::SetFrameRate,
                command_len: 6,
                reply_len: 6,
                param: ParamWidth::U16,
                acknowledged: false,
            },
            Command::SetBaudRate(_) => CommandDescriptor {
                opcode: Opcode::SetBaudRate,
                command_len: 8,
                reply_len: 8,
                param: ParamWidth::U32,
                acknowledged: false,
            },
            Command::SaveSettings => CommandDescriptor {
                opcode: Opcode::SaveSettings,
                command_len: 4,
                reply_len: 5,
                param: ParamWidth::None,
                acknowledged: true,
            },
            Command::TriggerDetection => CommandDescriptor {
                opcode: Opcode::TriggerDetection,
                command_len: 4,
                reply_len: 0,
                param: ParamWidth::None,
                acknowledged: false,
            },
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.descriptor().opcode
    }

    /// Build the outbound frame: header, length, opcode, parameter, checksum.
    pub fn encode(&self) -> BytesMut {
        let desc = self.descriptor();
        let mut frame = BytesMut::with_capacity(desc.command_len);
        frame.put_u8(COMMAND_HEADER);
        frame.put_u8(desc.command_len as u8);
        frame.put_u8(desc.opcode.into());

        match *self {
            Command::SetFrameRate(rate) => frame.put_u16_le(rate),
            Command::SetBaudRate(baud) => frame.put_u32_le(baud),
            _ => {}
        }
        debug_assert_eq!(frame.len(), desc.command_len - 1);

        frame.put_u8(checksum(&frame));
        frame
    }
}

/// Send one command and, when the command has a reply, wait for it and
/// validate it. Stale input is drained first so leftover measurement
/// frames are never mistaken for a reply.
pub fn send_command<L: SerialLink + ?Sized>(
    link: &mut L,
    command: Command,
    deadline: Instant,
) -> Result<(), TfminiError> {
    let desc = command.descriptor();
    let frame = command.encode();

    link.drain_input()?;
    link.write_all(&frame)?;
    debug!(opcode = ?desc.opcode, len = desc.command_len, "command sent");

    if desc.reply_len == 0 {
        return Ok(());
    }

    read_reply(link, &desc, deadline)
}

/// Synchronize on a reply with the same sliding-window scan used for
/// measurement frames, keyed on the header byte plus the expected length.
fn read_reply<L: SerialLink + ?Sized>(
    link: &mut L,
    desc: &CommandDescriptor,
    deadline: Instant,
) -> Result<(), TfminiError> {
    let reply_len = desc.reply_len;
    let mut window = [0u8; REPLY_MAX];

    while Instant::now() < deadline {
        if link.bytes_available()? == 0 {
            std::thread::sleep(IDLE_WAIT);
            continue;
        }

        let Some(byte) = link.read_byte()? else {
            continue;
        };

        window.copy_within(1..reply_len, 0);
        window[reply_len - 1] = byte;

        if window[0] != COMMAND_HEADER || window[1] as usize != reply_len {
            continue;
        }

        if checksum(&window[..reply_len - 1]) != window[reply_len - 1] {
            return Err(TfminiError::ReplyChecksum(desc.opcode));
        }

        if desc.acknowledged && window[ACK_FLAG_OFFSET] == 1 {
            return Err(TfminiError::CommandRejected(desc.opcode));
        }

        return Ok(());
    }

    Err(TfminiError::ReplyTimeout(desc.opcode))
}
