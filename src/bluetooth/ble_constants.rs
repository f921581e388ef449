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

//! BLE identifiers and protocol constants for SOLEM BLIP controllers.
//!
//! Everything here was observed on real hardware rather than taken from
//! vendor documentation, so treat the values as provisional.

use uuid::Uuid;

/// Command characteristic UUID (host writes command and commit frames here).
/// Properties: Write
pub const WRITE_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x108b0002_eab5_bc09_d0ea_0b8f467ce8ee);

/// Notification characteristic UUID (device pushes status bursts here).
/// Properties: Notify
pub const NOTIFY_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x108b0003_eab5_bc09_d0ea_0b8f467ce8ee);

/// Name reported for the device family.
pub const DEVICE_NAME: &str = "SOLEM BLIP";

/// Frame opcodes.
pub mod opcodes {
    /// Every command frame starts with this opcode.
    pub const COMMAND: u16 = 0x3105;
    /// Commit frame, sent after each command frame.
    pub const COMMIT: u16 = 0x3B00;
}

/// Command subcodes (third byte of a command frame).
pub mod subcodes {
    pub const WATER_ALL_ZONES: u8 = 0x11;
    pub const WATER_ZONE: u8 = 0x12;
    pub const RUN_PROGRAM: u8 = 0x14;
    pub const STOP: u8 = 0x15;
    pub const ON: u8 = 0xA0;
    pub const OFF: u8 = 0xC0;
}

/// Prefixes identifying notification frame families.
pub mod prefixes {
    pub const STATUS: u16 = 0x3210;
    pub const EXTENDED: u16 = 0x3C10;

    /// Whether `prefix` belongs to a known notification family.
    pub fn is_known(prefix: u16) -> bool {
        matches!(prefix, STATUS | EXTENDED)
    }
}

/// Packet markers carried in the status byte of a notification.
///
/// The marker counts the packets still to come in the burst.
pub mod packet {
    pub const FIRST: u8 = 0x02;
    pub const MIDDLE: u8 = 0x01;
    pub const FINAL: u8 = 0x00;
}

/// Sub-status codes carried by the first packet of a burst.
pub mod sub_status {
    pub const PROGRAMMED_OFF: u8 = 0x02;
    pub const IDLE: u8 = 0x40;
    pub const ALL_ZONES_ACTIVE: u8 = 0x41;
    pub const SINGLE_ZONE_ACTIVE: u8 = 0x42;
}

/// Argument limits enforced before anything is transmitted.
pub mod limits {
    use std::ops::RangeInclusive;

    /// The device silently ignores watering requests shorter than this.
    pub const MIN_WATERING_SECS: u16 = 60;
    /// 12 hours.
    pub const MAX_WATERING_SECS: u16 = 0xA8C0;
    pub const ZONES: RangeInclusive<u8> = 1..=3;
    /// 0 means "off permanently".
    pub const MAX_OFF_DAYS: u16 = 15;
    /// Fixed argument of the `on` command.
    pub const ON_ARGUMENT: u16 = 0x0001;
    /// Argument of the stop command.
    pub const STOP_ARGUMENT: u16 = 0x00FF;
}

/// Frame layout.
pub mod layout {
    /// Every command frame is this long, whatever its shape.
    pub const COMMAND_FRAME_LEN: usize = 7;
    pub const COMMIT_FRAME_LEN: usize = 2;

    /// Prefix plus status and sub-status bytes.
    pub const ENVELOPE_MIN_LEN: usize = 4;
    /// Shortest packet that carries the timer field.
    pub const STATUS_PACKET_LEN: usize = 18;

    pub const PREFIX_OFFSET: usize = 0;
    pub const STATUS_OFFSET: usize = 2;
    pub const SUB_STATUS_OFFSET: usize = 3;
    pub const TIMER_OFFSET: usize = 13;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        assert_eq!(
            WRITE_CHARACTERISTIC_UUID.to_string(),
            "108b0002-eab5-bc09-d0ea-0b8f467ce8ee"
        );
        assert_eq!(
            NOTIFY_CHARACTERISTIC_UUID.to_string(),
            "108b0003-eab5-bc09-d0ea-0b8f467ce8ee"
        );
    }

    #[test]
    fn test_timer_fits_in_status_packet() {
        assert!(layout::TIMER_OFFSET + 2 <= layout::STATUS_PACKET_LEN);
        assert!(layout::SUB_STATUS_OFFSET < layout::ENVELOPE_MIN_LEN);
    }

    #[test]
    fn test_known_prefixes() {
        assert!(prefixes::is_known(0x3210));
        assert!(prefixes::is_known(0x3C10));
        assert!(!prefixes::is_known(0x3105));
    }
}
