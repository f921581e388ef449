// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command and notification frame codec.
//!
//! All multi-byte integers on the wire are big-endian. Command frames come
//! in two shapes of the same length:
//!
//! ```text
//! single-byte argument:  31 05 [sub] [a:1B] 00 [b:2B]
//! double-byte argument:  31 05 [sub] [a:2B]    [b:2B]
//! ```
//!
//! Only the single-zone watering command uses the single-byte shape.

use std::fmt;

use crate::error::{Error, Result};

use super::ble_constants::{layout, limits, opcodes, packet, subcodes};

/// The constant commit frame.
pub const COMMIT_FRAME: [u8; layout::COMMIT_FRAME_LEN] = opcodes::COMMIT.to_be_bytes();

/// First command argument; its width depends on the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Argument {
    /// One byte followed by a reserved zero byte.
    Byte(u8),
    Word(u16),
}

impl Argument {
    /// Numeric value regardless of width.
    pub fn value(&self) -> u16 {
        match self {
            Self::Byte(b) => u16::from(*b),
            Self::Word(w) => *w,
        }
    }
}

/// A command frame as it travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    pub opcode: u16,
    pub subcode: u8,
    pub argument_a: Argument,
    /// Usually a duration in seconds.
    pub argument_b: u16,
}

impl CommandFrame {
    fn new(subcode: u8, argument_a: Argument, argument_b: u16) -> Self {
        Self {
            opcode: opcodes::COMMAND,
            subcode,
            argument_a,
            argument_b,
        }
    }

    /// Serialize to wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(layout::COMMAND_FRAME_LEN);
        buf.extend_from_slice(&self.opcode.to_be_bytes());
        buf.push(self.subcode);
        match self.argument_a {
            Argument::Byte(b) => {
                buf.push(b);
                buf.push(0x00);
            }
            Argument::Word(w) => buf.extend_from_slice(&w.to_be_bytes()),
        }
        buf.extend_from_slice(&self.argument_b.to_be_bytes());
        buf
    }

    /// Parse wire bytes back into a frame.
    ///
    /// The argument shape is chosen from the subcode, so this accepts any
    /// well-formed frame, including subcodes this crate never emits.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() != layout::COMMAND_FRAME_LEN {
            return Err(Error::malformed(format!(
                "command frame must be {} bytes, got {}",
                layout::COMMAND_FRAME_LEN,
                data.len()
            )));
        }

        let opcode = u16::from_be_bytes([data[0], data[1]]);
        if opcode != opcodes::COMMAND {
            return Err(Error::malformed(format!(
                "unexpected command opcode 0x{:04x}",
                opcode
            )));
        }

        let subcode = data[2];
        let argument_a = if uses_byte_argument(subcode) {
            if data[4] != 0x00 {
                return Err(Error::malformed(format!(
                    "reserved byte is 0x{:02x}, expected 0x00",
                    data[4]
                )));
            }
            Argument::Byte(data[3])
        } else {
            Argument::Word(u16::from_be_bytes([data[3], data[4]]))
        };
        let argument_b = u16::from_be_bytes([data[5], data[6]]);

        Ok(Self {
            opcode,
            subcode,
            argument_a,
            argument_b,
        })
    }
}

fn uses_byte_argument(subcode: u8) -> bool {
    subcode == subcodes::WATER_ZONE
}

/// Operator intents understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Water a single zone.
    WaterZone { zone: u8, duration_secs: u16 },
    /// Water every zone in turn.
    WaterAllZones { duration_secs: u16 },
    /// Stop any manual watering.
    Stop,
    /// Switch the controller on (resume programs).
    On,
    /// Switch the controller off for `days` days, 0 meaning permanently.
    Off { days: u16 },
    /// Start a stored program.
    RunProgram { program: u16 },
}

impl Command {
    /// Water `zone` for a number of minutes.
    pub fn water_zone_minutes(zone: u8, minutes: u16) -> Result<Self> {
        Ok(Self::WaterZone {
            zone,
            duration_secs: minutes_to_secs(minutes)?,
        })
    }

    /// Water all zones for a number of minutes.
    pub fn water_all_minutes(minutes: u16) -> Result<Self> {
        Ok(Self::WaterAllZones {
            duration_secs: minutes_to_secs(minutes)?,
        })
    }

    /// Validate arguments and build the wire frame.
    pub fn frame(&self) -> Result<CommandFrame> {
        match *self {
            Self::WaterZone {
                zone,
                duration_secs,
            } => {
                validate_zone(zone)?;
                validate_duration(duration_secs)?;
                Ok(CommandFrame::new(
                    subcodes::WATER_ZONE,
                    Argument::Byte(zone),
                    duration_secs,
                ))
            }
            Self::WaterAllZones { duration_secs } => {
                validate_duration(duration_secs)?;
                Ok(CommandFrame::new(
                    subcodes::WATER_ALL_ZONES,
                    Argument::Word(0),
                    duration_secs,
                ))
            }
            Self::Stop => Ok(CommandFrame::new(
                subcodes::STOP,
                Argument::Word(limits::STOP_ARGUMENT),
                0,
            )),
            Self::On => Ok(CommandFrame::new(
                subcodes::ON,
                Argument::Word(limits::ON_ARGUMENT),
                0,
            )),
            Self::Off { days } => {
                if days > limits::MAX_OFF_DAYS {
                    return Err(Error::invalid(format!(
                        "off days must be at most {}, got {}",
                        limits::MAX_OFF_DAYS,
                        days
                    )));
                }
                Ok(CommandFrame::new(subcodes::OFF, Argument::Word(days), 0))
            }
            Self::RunProgram { program } => Ok(CommandFrame::new(
                subcodes::RUN_PROGRAM,
                Argument::Word(program),
                0,
            )),
        }
    }

    /// Validate and serialize in one step.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.frame()?.to_bytes())
    }

    /// Recover the intent behind a parsed frame.
    pub fn from_frame(frame: &CommandFrame) -> Result<Self> {
        let command = match (frame.subcode, frame.argument_a) {
            (subcodes::WATER_ZONE, Argument::Byte(zone)) => Self::WaterZone {
                zone,
                duration_secs: frame.argument_b,
            },
            (subcodes::WATER_ALL_ZONES, _) => Self::WaterAllZones {
                duration_secs: frame.argument_b,
            },
            (subcodes::STOP, _) => Self::Stop,
            (subcodes::ON, _) => Self::On,
            (subcodes::OFF, a) => Self::Off { days: a.value() },
            (subcodes::RUN_PROGRAM, a) => Self::RunProgram { program: a.value() },
            (other, _) => {
                return Err(Error::malformed(format!(
                    "unknown command subcode 0x{:02x}",
                    other
                )))
            }
        };
        Ok(command)
    }

    /// Parse wire bytes into an intent.
    pub fn decode(data: &[u8]) -> Result<Self> {
        Self::from_frame(&CommandFrame::from_bytes(data)?)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaterZone {
                zone,
                duration_secs,
            } => write!(f, "water zone {} for {}s", zone, duration_secs),
            Self::WaterAllZones { duration_secs } => {
                write!(f, "water all zones for {}s", duration_secs)
            }
            Self::Stop => write!(f, "stop watering"),
            Self::On => write!(f, "on"),
            Self::Off { days: 0 } => write!(f, "off permanently"),
            Self::Off { days } => write!(f, "off for {} days", days),
            Self::RunProgram { program } => write!(f, "run program {}", program),
        }
    }
}

fn minutes_to_secs(minutes: u16) -> Result<u16> {
    minutes
        .checked_mul(60)
        .ok_or_else(|| Error::invalid(format!("{} minutes does not fit the duration field", minutes)))
}

fn validate_zone(zone: u8) -> Result<()> {
    if !limits::ZONES.contains(&zone) {
        return Err(Error::invalid(format!(
            "zone must be in {}..={}, got {}",
            limits::ZONES.start(),
            limits::ZONES.end(),
            zone
        )));
    }
    Ok(())
}

fn validate_duration(secs: u16) -> Result<()> {
    if secs < limits::MIN_WATERING_SECS {
        return Err(Error::invalid(format!(
            "watering duration must be at least {}s, got {}s",
            limits::MIN_WATERING_SECS,
            secs
        )));
    }
    if secs > limits::MAX_WATERING_SECS {
        return Err(Error::invalid(format!(
            "watering duration must be at most {}s, got {}s",
            limits::MAX_WATERING_SECS,
            secs
        )));
    }
    Ok(())
}

/// Encode a single-zone watering command.
pub fn encode_single_zone_command(zone: u8, duration_secs: u16) -> Result<Vec<u8>> {
    Command::WaterZone {
        zone,
        duration_secs,
    }
    .encode()
}

/// Encode an all-zones watering command.
pub fn encode_all_zones_command(duration_secs: u16) -> Result<Vec<u8>> {
    Command::WaterAllZones { duration_secs }.encode()
}

/// Encode the stop command. Always valid.
pub fn encode_stop_command() -> Vec<u8> {
    CommandFrame::new(
        subcodes::STOP,
        Argument::Word(limits::STOP_ARGUMENT),
        0,
    )
    .to_bytes()
}

/// Encode the `on` command. Always valid.
pub fn encode_on_command() -> Vec<u8> {
    CommandFrame::new(subcodes::ON, Argument::Word(limits::ON_ARGUMENT), 0).to_bytes()
}

/// Encode the `off` command for `days` days (0 = permanently).
pub fn encode_off_command(days: u16) -> Result<Vec<u8>> {
    Command::Off { days }.encode()
}

/// Encode a run-program command.
pub fn encode_run_program_command(program_id: u16) -> Vec<u8> {
    CommandFrame::new(subcodes::RUN_PROGRAM, Argument::Word(program_id), 0).to_bytes()
}

/// Encode the commit frame.
pub fn encode_commit() -> Vec<u8> {
    COMMIT_FRAME.to_vec()
}

/// Position of a packet within a notification burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    First,
    Middle,
    Final,
    /// Marker not seen on hardware so far.
    Other(u8),
}

impl PacketKind {
    pub fn from_marker(marker: u8) -> Self {
        match marker {
            packet::FIRST => Self::First,
            packet::MIDDLE => Self::Middle,
            packet::FINAL => Self::Final,
            other => Self::Other(other),
        }
    }
}

/// Parsed header of an inbound notification packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEnvelope {
    /// Frame family tag.
    pub prefix: u16,
    /// Packet-sequence marker.
    pub status_byte: u8,
    /// Device mode when `status_byte` marks the first packet.
    pub sub_status_byte: u8,
    /// Remaining run time in seconds, present only on full-length packets.
    pub timer_remaining: Option<u16>,
    /// Total packet length.
    pub length: usize,
}

impl NotificationEnvelope {
    pub fn packet_kind(&self) -> PacketKind {
        PacketKind::from_marker(self.status_byte)
    }

    /// Whether this packet opens a burst and so carries the status snapshot.
    pub fn is_first_packet(&self) -> bool {
        self.packet_kind() == PacketKind::First
    }
}

/// Parse the envelope of an inbound notification.
///
/// Never reads past the end of `data`; short input yields
/// [`Error::MalformedFrame`].
pub fn decode_notification(data: &[u8]) -> Result<NotificationEnvelope> {
    if data.len() < layout::ENVELOPE_MIN_LEN {
        return Err(Error::malformed(format!(
            "notification must be at least {} bytes, got {}",
            layout::ENVELOPE_MIN_LEN,
            data.len()
        )));
    }

    let prefix = u16::from_be_bytes([
        data[layout::PREFIX_OFFSET],
        data[layout::PREFIX_OFFSET + 1],
    ]);

    let timer_remaining = if data.len() >= layout::STATUS_PACKET_LEN {
        read_u16_be(data, layout::TIMER_OFFSET)
    } else {
        None
    };

    Ok(NotificationEnvelope {
        prefix,
        status_byte: data[layout::STATUS_OFFSET],
        sub_status_byte: data[layout::SUB_STATUS_OFFSET],
        timer_remaining,
        length: data.len(),
    })
}

/// Bounds-checked big-endian read.
pub(crate) fn read_u16_be(data: &[u8], offset: usize) -> Option<u16> {
    let bytes = data.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}
