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

//! Troubleshooting helpers.
//!
//! Nothing in the driver depends on these for normal operation; they exist
//! to help map out undocumented parts of the protocol.

use crate::bluetooth::{CharacteristicInfo, NOTIFY_CHARACTERISTIC_UUID, WRITE_CHARACTERISTIC_UUID};

/// A 16-bit value found in a payload that could be a countdown timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerCandidate {
    pub offset: usize,
    pub big_endian: bool,
    pub seconds: u16,
}

/// Read every 16-bit window of `payload` in both byte orders and keep the
/// values that fall within `1..=max_seconds`.
pub fn scan_timer_candidates(payload: &[u8], max_seconds: u16) -> Vec<TimerCandidate> {
    let mut candidates = Vec::new();

    for (offset, pair) in payload.windows(2).enumerate() {
        let be = u16::from_be_bytes([pair[0], pair[1]]);
        let le = u16::from_le_bytes([pair[0], pair[1]]);

        if (1..=max_seconds).contains(&be) {
            candidates.push(TimerCandidate {
                offset,
                big_endian: true,
                seconds: be,
            });
        }
        if le != be && (1..=max_seconds).contains(&le) {
            candidates.push(TimerCandidate {
                offset,
                big_endian: false,
                seconds: le,
            });
        }
    }

    candidates
}

/// Keep only candidates whose value matches `expected_seconds` within
/// `tolerance`, e.g. a duration that was just commanded.
pub fn matching_candidates(
    candidates: &[TimerCandidate],
    expected_seconds: u16,
    tolerance: u16,
) -> Vec<TimerCandidate> {
    candidates
        .iter()
        .filter(|c| c.seconds.abs_diff(expected_seconds) <= tolerance)
        .copied()
        .collect()
}

/// One human readable line per characteristic.
pub fn describe_characteristics(characteristics: &[CharacteristicInfo]) -> Vec<String> {
    characteristics
        .iter()
        .map(|c| {
            let role = if c.uuid == WRITE_CHARACTERISTIC_UUID {
                " (command)"
            } else if c.uuid == NOTIFY_CHARACTERISTIC_UUID {
                " (status)"
            } else {
                ""
            };
            format!("Service {} / Characteristic {} [{}]{}", c.service, c.uuid, c.flags, role)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::CharacteristicFlags;
    use uuid::Uuid;

    #[test]
    fn test_scan_finds_both_orders() {
        // 0x012C = 300 big-endian at offset 1, 0x2C01 little-endian is too large.
        let payload = [0x00, 0x01, 0x2C, 0x00];
        let candidates = scan_timer_candidates(&payload, 3600);

        assert!(candidates.contains(&TimerCandidate {
            offset: 1,
            big_endian: true,
            seconds: 300
        }));
        // 0x0001 read little-endian at offset 0 is 256.
        assert!(candidates.contains(&TimerCandidate {
            offset: 0,
            big_endian: false,
            seconds: 256
        }));
        assert!(candidates.iter().all(|c| c.seconds <= 3600));
    }

    #[test]
    fn test_scan_short_payload() {
        assert!(scan_timer_candidates(&[], 100).is_empty());
        assert!(scan_timer_candidates(&[0x01], 100).is_empty());
    }

    #[test]
    fn test_matching_candidates() {
        let mut payload = vec![0u8; 18];
        payload[13..15].copy_from_slice(&118u16.to_be_bytes());
        let candidates = scan_timer_candidates(&payload, u16::MAX);

        // The trailing zero makes offset 14 read as 118 little-endian too.
        let matches = matching_candidates(&candidates, 120, 5);
        assert_eq!(
            matches,
            vec![
                TimerCandidate {
                    offset: 13,
                    big_endian: true,
                    seconds: 118
                },
                TimerCandidate {
                    offset: 14,
                    big_endian: false,
                    seconds: 118
                },
            ]
        );
    }

    #[test]
    fn test_describe_characteristics() {
        let lines = describe_characteristics(&[CharacteristicInfo {
            service: Uuid::from_u128(0x108b0001_eab5_bc09_d0ea_0b8f467ce8ee),
            uuid: WRITE_CHARACTERISTIC_UUID,
            flags: CharacteristicFlags {
                write: true,
                ..Default::default()
            },
        }]);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("108b0002-eab5-bc09-d0ea-0b8f467ce8ee"));
        assert!(lines[0].contains("[WRITE]"));
        assert!(lines[0].ends_with("(command)"));
    }
}
