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

//! High level controller API.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::bluetooth::{
    BleTransport, CharacteristicInfo, Command, CommandSequencer, ConnectionManager, LinkError,
    StatusReading, DEFAULT_NOTIFICATION_CAPACITY, DEFAULT_SETTLE_INTERVAL,
};
use crate::error::{Error, Result};
use crate::events::NotificationProcessor;
use crate::state::SessionState;

/// Everything the controller needs to know up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub address: String,
    pub max_attempts: u32,
    /// Pause between failed connection attempts.
    pub backoff: Duration,
    /// Pause after each write.
    pub settle_interval: Duration,
    /// How long a status query waits for the device to answer.
    pub status_timeout: Duration,
    pub notification_capacity: usize,
    /// Enumerate characteristics on connect instead of using the known UUIDs.
    pub discover_characteristics: bool,
}

impl ControllerSettings {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            max_attempts: 10,
            backoff: Duration::from_secs(2),
            settle_interval: DEFAULT_SETTLE_INTERVAL,
            status_timeout: Duration::from_secs(5),
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            discover_characteristics: false,
        }
    }
}

/// A single session with one irrigation controller.
///
/// Methods take `&mut self`, so commands on one session are serialized;
/// the device has no way to correlate responses with requests.
pub struct IrrigationController<T: BleTransport> {
    connection: ConnectionManager<T>,
    sequencer: CommandSequencer,
    processor: NotificationProcessor,
    settings: ControllerSettings,
}

impl<T: BleTransport> IrrigationController<T> {
    pub fn new(transport: T, settings: ControllerSettings) -> Self {
        let connection = ConnectionManager::new(transport, settings.address.clone())
            .with_discovery(settings.discover_characteristics)
            .with_notification_capacity(settings.notification_capacity);

        Self {
            connection,
            sequencer: CommandSequencer::new(settings.settle_interval),
            processor: NotificationProcessor::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn state(&self) -> Arc<SessionState> {
        self.connection.state()
    }

    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }

    /// Connect using the configured retry policy.
    pub async fn connect(&mut self) -> Result<()> {
        self.connection
            .connect(self.settings.max_attempts, self.settings.backoff)
            .await
    }

    pub async fn enable_notifications(&mut self) -> Result<()> {
        self.connection.enable_notifications().await
    }

    pub async fn disconnect(&mut self) {
        self.processor.reset();
        self.connection.disconnect().await;
    }

    /// Validate, encode and transmit a command.
    ///
    /// Arguments are checked before the connection, so a bad request never
    /// reaches the device.
    pub async fn send(&self, command: Command) -> Result<()> {
        let bytes = command.encode()?;
        let session = self.connection.session()?;

        info!("Sending: {}", command);
        self.sequencer
            .send(session.link(), session.write_uuid(), &bytes)
            .await
    }

    /// Water one zone for `duration_secs` seconds.
    pub async fn start_watering(&self, zone: u8, duration_secs: u16) -> Result<()> {
        self.send(Command::WaterZone {
            zone,
            duration_secs,
        })
        .await
    }

    /// Water every zone for `duration_secs` seconds.
    pub async fn start_watering_all(&self, duration_secs: u16) -> Result<()> {
        self.send(Command::WaterAllZones { duration_secs }).await
    }

    pub async fn stop_watering(&self) -> Result<()> {
        self.send(Command::Stop).await
    }

    pub async fn turn_on(&self) -> Result<()> {
        self.send(Command::On).await
    }

    /// Switch off for `days` days; 0 keeps it off until turned on again.
    pub async fn turn_off(&self, days: u16) -> Result<()> {
        self.send(Command::Off { days }).await
    }

    pub async fn run_program(&self, program: u16) -> Result<()> {
        self.send(Command::RunProgram { program }).await
    }

    /// Ask the device for its status.
    ///
    /// The protocol has no status request, so this sends the harmless `on`
    /// command and captures the first packet of the next burst. This was
    /// found by experiment and may not hold for every firmware.
    pub async fn query_status(&mut self) -> Result<StatusReading> {
        self.connection.enable_notifications().await?;
        let Some(rx) = self.connection.notifications() else {
            debug!("Device has no notify characteristic, cannot read status");
            return Ok(StatusReading::NoResponse);
        };

        let mut stale = 0;
        while rx.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            debug!("Discarded {} stale notification(s)", stale);
        }
        self.processor.reset();

        self.send(Command::On).await?;
        self.capture(&rx, self.settings.status_timeout).await
    }

    /// Wait up to `timeout` for the next status the device pushes on its own.
    ///
    /// Fails with [`Error::Transport`](crate::Error::Transport) once the link
    /// stops delivering notifications.
    pub async fn next_status(&mut self, timeout: Duration) -> Result<StatusReading> {
        self.connection.session()?;
        let Some(rx) = self.connection.notifications() else {
            return Ok(StatusReading::NoResponse);
        };
        self.capture(&rx, timeout).await
    }

    /// Raw first packet behind the most recent status, for diagnostics.
    pub fn last_status_packet(&self) -> Option<&[u8]> {
        self.processor.last_status_packet()
    }

    /// List the device's characteristics.
    pub async fn characteristics(&self) -> Result<Vec<CharacteristicInfo>> {
        self.connection.characteristics().await
    }

    async fn capture(
        &mut self,
        rx: &async_channel::Receiver<Vec<u8>>,
        timeout: Duration,
    ) -> Result<StatusReading> {
        let processor = &mut self.processor;
        let wait = async {
            while let Ok(data) = rx.recv().await {
                if let Some(status) = processor.push(&data) {
                    return Some(status);
                }
            }
            None
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(Some(status)) => {
                info!("Device status: {}", status);
                self.connection.state().set_last_status(status);
                Ok(StatusReading::Reported(status))
            }
            Ok(None) => {
                warn!("Notification channel closed");
                Err(Error::transport(
                    "receive notifications",
                    LinkError::Other("notification stream ended".into()),
                ))
            }
            Err(_) => {
                debug!("No status within {:?}", timeout);
                Ok(StatusReading::NoResponse)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::ble_constants::packet;
    use crate::bluetooth::fake::FakeTransport;
    use crate::bluetooth::DeviceMode;

    fn settings() -> ControllerSettings {
        ControllerSettings {
            backoff: Duration::ZERO,
            settle_interval: Duration::ZERO,
            status_timeout: Duration::from_millis(200),
            ..ControllerSettings::new("C8:B9:61:06:69:96")
        }
    }

    fn burst(sub_status: u8, timer: u16) -> Vec<Vec<u8>> {
        let mut first = vec![0u8; 18];
        first[..4].copy_from_slice(&[0x32, 0x10, packet::FIRST, sub_status]);
        first[13..15].copy_from_slice(&timer.to_be_bytes());
        vec![
            first,
            vec![0x32, 0x10, packet::MIDDLE, 0x00, 0x00],
            vec![0x32, 0x10, packet::FINAL, 0x00, 0x00],
        ]
    }

    #[tokio::test]
    async fn test_commands_need_connection() {
        let controller = IrrigationController::new(FakeTransport::new(), settings());
        assert!(matches!(
            controller.stop_watering().await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_invalid_arguments_checked_first() {
        let transport = FakeTransport::new();
        let controller = IrrigationController::new(transport.clone(), settings());

        // Rejected even though we are not connected.
        assert!(matches!(
            controller.start_watering(1, 30).await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            controller.start_watering(9, 120).await,
            Err(Error::InvalidArgument(_))
        ));
        assert!(transport.writes().is_empty());
    }

    #[tokio::test]
    async fn test_watering_writes() {
        let transport = FakeTransport::new();
        let mut controller = IrrigationController::new(transport.clone(), settings());
        controller.connect().await.unwrap();

        controller.start_watering(1, 300).await.unwrap();
        controller.start_watering_all(120).await.unwrap();
        controller.stop_watering().await.unwrap();

        let payloads: Vec<Vec<u8>> = transport.writes().into_iter().map(|(_, data)| data).collect();
        assert_eq!(
            payloads,
            vec![
                vec![0x31, 0x05, 0x12, 0x01, 0x00, 0x01, 0x2C],
                vec![0x3B, 0x00],
                vec![0x31, 0x05, 0x11, 0x00, 0x00, 0x00, 0x78],
                vec![0x3B, 0x00],
                vec![0x31, 0x05, 0x15, 0x00, 0xFF, 0x00, 0x00],
                vec![0x3B, 0x00],
            ]
        );
    }

    #[tokio::test]
    async fn test_query_status() {
        let transport = FakeTransport::new();
        transport.device.lock().reply_on_commit = burst(0x42, 270);

        let mut controller = IrrigationController::new(transport.clone(), settings());
        controller.connect().await.unwrap();

        let reading = controller.query_status().await.unwrap();
        let status = reading.status().unwrap();
        assert_eq!(status.mode, DeviceMode::SingleZoneActive);
        assert!(status.active);
        assert_eq!(status.timer_remaining_seconds, 270);
        assert_eq!(controller.state().get_last_status(), Some(*status));

        // The query went out as an `on` command plus commit.
        let writes = transport.writes();
        assert_eq!(writes[0].1, vec![0x31, 0x05, 0xA0, 0x00, 0x01, 0x00, 0x00]);
        assert_eq!(writes[1].1, vec![0x3B, 0x00]);
    }

    #[tokio::test]
    async fn test_query_status_ignores_stale_notifications() {
        let transport = FakeTransport::new();
        transport.device.lock().reply_on_commit = burst(0x40, 0);

        let mut controller = IrrigationController::new(transport.clone(), settings());
        controller.connect().await.unwrap();
        controller.enable_notifications().await.unwrap();

        // Left over from an earlier command.
        for packet in burst(0x41, 999) {
            transport.notify(&packet);
        }

        let reading = controller.query_status().await.unwrap();
        assert_eq!(reading.status().unwrap().mode, DeviceMode::Idle);
    }

    #[tokio::test]
    async fn test_query_status_without_answer() {
        let transport = FakeTransport::new();
        let mut controller = IrrigationController::new(transport, settings());
        controller.connect().await.unwrap();

        let reading = controller.query_status().await.unwrap();
        assert_eq!(reading, StatusReading::NoResponse);
        assert!(controller.state().get_connection().is_connected());
    }

    #[tokio::test]
    async fn test_next_status_skips_trailing_packets() {
        let transport = FakeTransport::new();
        let mut controller = IrrigationController::new(transport.clone(), settings());
        controller.connect().await.unwrap();
        controller.enable_notifications().await.unwrap();

        transport.notify(&[0x32, 0x10, packet::FINAL, 0x00]);
        transport.notify(&[0x32]);
        transport.notify(&burst(0x41, 60)[0]);

        let reading = controller
            .next_status(Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(reading.status().unwrap().mode, DeviceMode::AllZonesActive);
    }

    #[tokio::test]
    async fn test_closed_notification_stream_is_an_error() {
        let transport = FakeTransport::new();
        let mut controller = IrrigationController::new(transport.clone(), settings());
        controller.connect().await.unwrap();
        controller.enable_notifications().await.unwrap();

        // The link stops forwarding, as when the device goes away.
        transport.device.lock().sinks.clear();

        for _ in 0..2 {
            let err = controller
                .next_status(Duration::from_secs(60))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                Error::Transport {
                    operation: "receive notifications",
                    ..
                }
            ));
        }
        assert!(matches!(
            controller.query_status().await,
            Err(Error::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn test_last_status_packet() {
        let transport = FakeTransport::new();
        let mut controller = IrrigationController::new(transport.clone(), settings());
        controller.connect().await.unwrap();
        controller.enable_notifications().await.unwrap();
        assert!(controller.last_status_packet().is_none());

        let first = burst(0x42, 300).remove(0);
        transport.notify(&first);
        controller
            .next_status(Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(controller.last_status_packet(), Some(&first[..]));
    }

    #[tokio::test]
    async fn test_next_status_requires_connection() {
        let mut controller = IrrigationController::new(FakeTransport::new(), settings());
        assert!(matches!(
            controller.next_status(Duration::from_millis(10)).await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_abandoned_wait_keeps_session() {
        let transport = FakeTransport::new();
        let mut controller = IrrigationController::new(transport.clone(), settings());
        controller.connect().await.unwrap();
        controller.enable_notifications().await.unwrap();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), controller.next_status(Duration::from_secs(60)))
                .await;
        assert!(abandoned.is_err());

        // Still connected and still able to read statuses.
        assert!(controller.state().get_connection().is_connected());
        transport.notify(&burst(0x40, 0)[0]);
        let reading = controller
            .next_status(Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(reading.status().unwrap().mode, DeviceMode::Idle);
    }

    #[tokio::test]
    async fn test_disconnect_resets_state() {
        let transport = FakeTransport::new();
        let mut controller = IrrigationController::new(transport.clone(), settings());
        controller.connect().await.unwrap();
        controller.enable_notifications().await.unwrap();

        controller.disconnect().await;
        assert!(!controller.state().get_connection().is_connected());
        assert!(matches!(
            controller.turn_on().await,
            Err(Error::NotConnected)
        ));
    }
}
