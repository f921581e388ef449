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

//! Device status decoding.

use serde::Serialize;
use std::fmt;

use super::ble_constants::sub_status;
use super::protocol::{decode_notification, NotificationEnvelope};

/// Operating mode reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceMode {
    Idle,
    SingleZoneActive,
    AllZonesActive,
    ProgrammedOff,
    /// Sub-status code with no known meaning yet.
    Unknown(u8),
}

impl DeviceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SingleZoneActive => "single-zone-active",
            Self::AllZonesActive => "all-zones-active",
            Self::ProgrammedOff => "programmed-off",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "unknown (0x{:02x})", code),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Observed sub-status codes. New codes go here, not in the decode logic.
const MODE_TABLE: &[(u8, DeviceMode, bool)] = &[
    (sub_status::IDLE, DeviceMode::Idle, false),
    (sub_status::ALL_ZONES_ACTIVE, DeviceMode::AllZonesActive, true),
    (sub_status::SINGLE_ZONE_ACTIVE, DeviceMode::SingleZoneActive, true),
    (sub_status::PROGRAMMED_OFF, DeviceMode::ProgrammedOff, false),
];

/// Look up the mode and activity flag for a sub-status code.
pub fn mode_for(code: u8) -> (DeviceMode, bool) {
    MODE_TABLE
        .iter()
        .find(|(known, _, _)| *known == code)
        .map(|(_, mode, active)| (*mode, *active))
        .unwrap_or((DeviceMode::Unknown(code), false))
}

/// Snapshot of the controller state taken from the first packet of a burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceStatus {
    pub active: bool,
    pub mode: DeviceMode,
    /// Seconds of watering left, 0 when not reported.
    pub timer_remaining_seconds: u32,
    pub raw_sub_status_code: u8,
}

impl DeviceStatus {
    /// Decode a status from a notification envelope.
    ///
    /// Returns `None` unless the envelope opens a burst; middle and final
    /// packets carry no status snapshot.
    pub fn from_envelope(envelope: &NotificationEnvelope) -> Option<Self> {
        if !envelope.is_first_packet() {
            return None;
        }

        let code = envelope.sub_status_byte;
        let (mode, active) = mode_for(code);

        Some(Self {
            active,
            mode,
            timer_remaining_seconds: envelope.timer_remaining.map(u32::from).unwrap_or(0),
            raw_sub_status_code: code,
        })
    }

    /// Decode a status straight from raw notification bytes.
    ///
    /// Malformed input yields `None` rather than an error.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        decode_notification(data)
            .ok()
            .and_then(|envelope| Self::from_envelope(&envelope))
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mode)?;
        if self.timer_remaining_seconds > 0 {
            let secs = self.timer_remaining_seconds;
            write!(f, ", {}m{:02}s remaining", secs / 60, secs % 60)?;
        }
        Ok(())
    }
}

/// Outcome of a status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "status", rename_all = "kebab-case")]
pub enum StatusReading {
    Reported(DeviceStatus),
    /// No qualifying notification arrived.
    NoResponse,
}

impl StatusReading {
    pub fn status(&self) -> Option<&DeviceStatus> {
        match self {
            Self::Reported(status) => Some(status),
            Self::NoResponse => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::ble_constants::{layout, packet};

    fn packet_bytes(status: u8, sub_status: u8, timer: Option<u16>) -> Vec<u8> {
        let len = if timer.is_some() {
            layout::STATUS_PACKET_LEN
        } else {
            layout::ENVELOPE_MIN_LEN
        };
        let mut data = vec![0u8; len];
        data[0] = 0x32;
        data[1] = 0x10;
        data[2] = status;
        data[3] = sub_status;
        if let Some(timer) = timer {
            data[13..15].copy_from_slice(&timer.to_be_bytes());
        }
        data
    }

    #[test]
    fn test_single_zone_active() {
        let status = DeviceStatus::from_bytes(&packet_bytes(packet::FIRST, 0x42, Some(240))).unwrap();
        assert_eq!(status.mode, DeviceMode::SingleZoneActive);
        assert!(status.active);
        assert_eq!(status.timer_remaining_seconds, 240);
        assert_eq!(status.raw_sub_status_code, 0x42);
    }

    #[test]
    fn test_idle() {
        let status = DeviceStatus::from_bytes(&packet_bytes(packet::FIRST, 0x40, Some(0))).unwrap();
        assert_eq!(status.mode, DeviceMode::Idle);
        assert!(!status.active);
        assert_eq!(status.timer_remaining_seconds, 0);
    }

    #[test]
    fn test_all_zones_and_programmed_off() {
        let all = DeviceStatus::from_bytes(&packet_bytes(packet::FIRST, 0x41, Some(60))).unwrap();
        assert_eq!(all.mode, DeviceMode::AllZonesActive);
        assert!(all.active);

        let off = DeviceStatus::from_bytes(&packet_bytes(packet::FIRST, 0x02, None)).unwrap();
        assert_eq!(off.mode, DeviceMode::ProgrammedOff);
        assert!(!off.active);
    }

    #[test]
    fn test_unknown_code_preserved() {
        let status = DeviceStatus::from_bytes(&packet_bytes(packet::FIRST, 0x77, None)).unwrap();
        assert_eq!(status.mode, DeviceMode::Unknown(0x77));
        assert!(!status.active);
        assert_eq!(status.raw_sub_status_code, 0x77);
        assert_eq!(status.mode.to_string(), "unknown (0x77)");
    }

    #[test]
    fn test_timer_absent_on_short_packet() {
        let status = DeviceStatus::from_bytes(&packet_bytes(packet::FIRST, 0x42, None)).unwrap();
        assert_eq!(status.timer_remaining_seconds, 0);
    }

    #[test]
    fn test_non_first_packets_yield_nothing() {
        assert!(DeviceStatus::from_bytes(&packet_bytes(packet::MIDDLE, 0x42, Some(10))).is_none());
        assert!(DeviceStatus::from_bytes(&packet_bytes(packet::FINAL, 0x42, Some(10))).is_none());
        assert!(DeviceStatus::from_bytes(&[0x32, 0x10]).is_none());
    }

    #[test]
    fn test_display() {
        let status = DeviceStatus {
            active: true,
            mode: DeviceMode::SingleZoneActive,
            timer_remaining_seconds: 125,
            raw_sub_status_code: 0x42,
        };
        assert_eq!(status.to_string(), "single-zone-active, 2m05s remaining");
    }

    #[test]
    fn test_reading_serialization() {
        let json = serde_json::to_string(&StatusReading::NoResponse).unwrap();
        assert_eq!(json, r#"{"result":"no-response"}"#);
    }
}
