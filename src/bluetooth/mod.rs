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

//! Bluetooth LE driver for SOLEM BLIP controllers.
//!
//! Frames are encoded in [`protocol`](self), sent by the
//! [`CommandSequencer`] over a [`BleLink`] owned by the
//! [`ConnectionManager`]. Notifications come back as raw payloads and are
//! decoded into [`DeviceStatus`] values.

pub mod ble_constants;
mod connection;
mod link;
mod protocol;
mod reassembler;
mod sequencer;
mod status;

#[cfg(feature = "bluez")]
pub mod bluez;

#[cfg(test)]
pub(crate) mod fake;

pub use ble_constants::{DEVICE_NAME, NOTIFY_CHARACTERISTIC_UUID, WRITE_CHARACTERISTIC_UUID};
pub use connection::{
    select_characteristics, ConnectionManager, Session, DEFAULT_NOTIFICATION_CAPACITY,
};
pub use link::{
    BleLink, BleTransport, CharacteristicFlags, CharacteristicInfo, LinkError, NotificationSink,
};
pub use protocol::{
    decode_notification, encode_all_zones_command, encode_commit, encode_off_command,
    encode_on_command, encode_run_program_command, encode_single_zone_command,
    encode_stop_command, Argument, Command, CommandFrame, NotificationEnvelope, PacketKind,
    COMMIT_FRAME,
};
pub use reassembler::{Burst, BurstAssembler};
pub use sequencer::{CommandSequencer, DEFAULT_SETTLE_INTERVAL};
pub use status::{mode_for, DeviceMode, DeviceStatus, StatusReading};
