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

//! Notification burst reassembly.
//!
//! The controller answers state changes with a burst of up to three
//! packets: first, middle, final. Only the first one carries the status
//! snapshot; the rest is kept so diagnostics can look at whole bursts.

use tracing::{debug, warn};

use super::protocol::{NotificationEnvelope, PacketKind};

/// A complete (or cut short) notification burst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Burst {
    pub first: NotificationEnvelope,
    /// Raw bytes of every packet in arrival order, first packet included.
    pub packets: Vec<Vec<u8>>,
    /// False when a new burst started before this one saw its final packet.
    pub complete: bool,
}

/// Tracks packets belonging to the current burst.
pub struct BurstAssembler {
    current: Option<Burst>,
}

impl BurstAssembler {
    /// Create a new burst assembler.
    pub fn new() -> Self {
        Self { current: None }
    }

    /// Feed one parsed packet.
    ///
    /// Returns a burst when the packet closes it, or when a first packet
    /// arrives while an earlier burst is still open (that earlier burst is
    /// returned with `complete == false`).
    pub fn process_packet(&mut self, envelope: &NotificationEnvelope, raw: &[u8]) -> Option<Burst> {
        match envelope.packet_kind() {
            PacketKind::First => {
                let interrupted = self.current.take().map(|mut burst| {
                    warn!(
                        "Burst interrupted after {} packet(s)",
                        burst.packets.len()
                    );
                    burst.complete = false;
                    burst
                });

                self.current = Some(Burst {
                    first: envelope.clone(),
                    packets: vec![raw.to_vec()],
                    complete: false,
                });
                debug!("Started burst, sub-status 0x{:02x}", envelope.sub_status_byte);

                interrupted
            }
            PacketKind::Middle => {
                match self.current.as_mut() {
                    Some(burst) => burst.packets.push(raw.to_vec()),
                    None => warn!("Received middle packet without start"),
                }
                None
            }
            PacketKind::Final => match self.current.take() {
                Some(mut burst) => {
                    burst.packets.push(raw.to_vec());
                    burst.complete = true;
                    debug!("Burst complete: {} packets", burst.packets.len());
                    Some(burst)
                }
                None => {
                    warn!("Received final packet without start");
                    None
                }
            },
            PacketKind::Other(marker) => {
                warn!("Unexpected packet marker 0x{:02x}", marker);
                None
            }
        }
    }

    /// Drop any partially received burst.
    pub fn reset(&mut self) {
        self.current = None;
    }

    /// Check if a burst is open.
    pub fn is_in_progress(&self) -> bool {
        self.current.is_some()
    }

    /// Packets received so far in the open burst.
    pub fn pending_packets(&self) -> usize {
        self.current.as_ref().map_or(0, |burst| burst.packets.len())
    }
}

impl Default for BurstAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::ble_constants::packet;
    use crate::bluetooth::protocol::decode_notification;

    fn feed(assembler: &mut BurstAssembler, raw: &[u8]) -> Option<Burst> {
        let envelope = decode_notification(raw).unwrap();
        assembler.process_packet(&envelope, raw)
    }

    #[test]
    fn test_three_packet_burst() {
        let mut assembler = BurstAssembler::new();

        let first = [0x32, 0x10, packet::FIRST, 0x42, 0xAA];
        let middle = [0x32, 0x10, packet::MIDDLE, 0x00, 0xBB];
        let last = [0x32, 0x10, packet::FINAL, 0x00, 0xCC];

        assert!(feed(&mut assembler, &first).is_none());
        assert!(assembler.is_in_progress());
        assert!(feed(&mut assembler, &middle).is_none());
        assert_eq!(assembler.pending_packets(), 2);

        let burst = feed(&mut assembler, &last).unwrap();
        assert!(burst.complete);
        assert_eq!(burst.packets.len(), 3);
        assert_eq!(burst.first.sub_status_byte, 0x42);
        assert!(!assembler.is_in_progress());
    }

    #[test]
    fn test_interrupted_burst() {
        let mut assembler = BurstAssembler::new();

        assert!(feed(&mut assembler, &[0x32, 0x10, packet::FIRST, 0x42]).is_none());
        let interrupted = feed(&mut assembler, &[0x32, 0x10, packet::FIRST, 0x40]).unwrap();
        assert!(!interrupted.complete);
        assert_eq!(interrupted.first.sub_status_byte, 0x42);

        // The new burst is open.
        assert!(assembler.is_in_progress());
        assert_eq!(assembler.pending_packets(), 1);
    }

    #[test]
    fn test_orphan_packets_ignored() {
        let mut assembler = BurstAssembler::new();

        assert!(feed(&mut assembler, &[0x32, 0x10, packet::MIDDLE, 0x00]).is_none());
        assert!(feed(&mut assembler, &[0x32, 0x10, packet::FINAL, 0x00]).is_none());
        assert!(feed(&mut assembler, &[0x32, 0x10, 0x7F, 0x00]).is_none());
        assert!(!assembler.is_in_progress());
    }

    #[test]
    fn test_reset() {
        let mut assembler = BurstAssembler::new();
        feed(&mut assembler, &[0x32, 0x10, packet::FIRST, 0x42]);
        assembler.reset();
        assert!(!assembler.is_in_progress());
        assert_eq!(assembler.pending_packets(), 0);
    }
}
