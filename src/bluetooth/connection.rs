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

//! Connection lifecycle for a single controller session.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ble_constants::{NOTIFY_CHARACTERISTIC_UUID, WRITE_CHARACTERISTIC_UUID};
use super::link::{BleLink, BleTransport, CharacteristicInfo, LinkError};
use crate::diagnostics;
use crate::error::{Error, Result};
use crate::state::{ConnectionState, SessionState};

/// Default capacity of the notification channel.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 32;

/// An open link plus the characteristics resolved for it.
pub struct Session<L> {
    link: L,
    write_uuid: Uuid,
    notify_uuid: Option<Uuid>,
    notifications: Option<async_channel::Receiver<Vec<u8>>>,
}

impl<L: BleLink> Session<L> {
    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn write_uuid(&self) -> Uuid {
        self.write_uuid
    }

    pub fn notify_uuid(&self) -> Option<Uuid> {
        self.notify_uuid
    }
}

/// Owns the BLE link and drives the connect/disconnect state machine.
pub struct ConnectionManager<T: BleTransport> {
    transport: T,
    address: String,
    discover_characteristics: bool,
    notification_capacity: usize,
    state: Arc<SessionState>,
    session: Option<Session<T::Link>>,
}

impl<T: BleTransport> ConnectionManager<T> {
    /// Create a manager for the device at `address`.
    pub fn new(transport: T, address: impl Into<String>) -> Self {
        Self {
            transport,
            address: address.into(),
            discover_characteristics: false,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            state: SessionState::new(),
            session: None,
        }
    }

    /// Enumerate characteristics on connect instead of using the fixed UUIDs.
    pub fn with_discovery(mut self, enabled: bool) -> Self {
        self.discover_characteristics = enabled;
        self
    }

    pub fn with_notification_capacity(mut self, capacity: usize) -> Self {
        self.notification_capacity = capacity.max(1);
        self
    }

    /// Publish state into an existing shared snapshot.
    pub fn with_state(mut self, state: Arc<SessionState>) -> Self {
        self.state = state;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn state(&self) -> Arc<SessionState> {
        self.state.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state.get_connection()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// The open session, or [`Error::NotConnected`].
    pub fn session(&self) -> Result<&Session<T::Link>> {
        self.session.as_ref().ok_or(Error::NotConnected)
    }

    /// Receiver for raw notification payloads, once notifications are on.
    ///
    /// The receiver is a clone; dropping it does not unsubscribe.
    pub fn notifications(&self) -> Option<async_channel::Receiver<Vec<u8>>> {
        self.session
            .as_ref()
            .and_then(|session| session.notifications.clone())
    }

    /// Connect, retrying up to `max_attempts` times with `backoff` between
    /// failures.
    ///
    /// Dropping the future part way through leaves the manager
    /// `Disconnected`.
    pub async fn connect(&mut self, max_attempts: u32, backoff: Duration) -> Result<()> {
        if max_attempts == 0 {
            return Err(Error::invalid("max_attempts must be at least 1"));
        }
        if self.session.is_some() {
            debug!("Already connected to {}", self.address);
            return Ok(());
        }

        let mut pending = ResetOnDrop::new(self.state.clone());
        for attempt in 1..=max_attempts {
            self.state.set_connection(ConnectionState::Connecting { attempt });
            info!(
                "Connecting to {} (attempt {}/{})",
                self.address, attempt, max_attempts
            );

            match self.open_session().await {
                Ok(session) => {
                    info!(
                        "Connected to {} (write {}, notify {})",
                        self.address,
                        session.write_uuid,
                        session
                            .notify_uuid
                            .map_or_else(|| "none".to_string(), |uuid| uuid.to_string())
                    );
                    self.session = Some(session);
                    self.state.set_connection(ConnectionState::Connected);
                    pending.disarm();
                    return Ok(());
                }
                Err(e) => warn!("Connection attempt {} failed: {}", attempt, e),
            }

            if attempt < max_attempts {
                tokio::time::sleep(backoff).await;
            }
        }

        Err(Error::ConnectionFailed(max_attempts))
    }

    async fn open_session(&self) -> std::result::Result<Session<T::Link>, LinkError> {
        let mut link = self.transport.connect(&self.address).await?;

        let resolved = if self.discover_characteristics {
            Self::discover(&link).await
        } else {
            Ok((WRITE_CHARACTERISTIC_UUID, Some(NOTIFY_CHARACTERISTIC_UUID)))
        };

        match resolved {
            Ok((write_uuid, notify_uuid)) => Ok(Session {
                link,
                write_uuid,
                notify_uuid,
                notifications: None,
            }),
            Err(e) => {
                if let Err(close) = link.disconnect().await {
                    debug!("Closing half-open link failed: {}", close);
                }
                Err(e)
            }
        }
    }

    async fn discover(link: &T::Link) -> std::result::Result<(Uuid, Option<Uuid>), LinkError> {
        let characteristics = link.characteristics().await?;
        for line in diagnostics::describe_characteristics(&characteristics) {
            debug!("{}", line);
        }
        select_characteristics(&characteristics)
            .ok_or(LinkError::CharacteristicNotFound(WRITE_CHARACTERISTIC_UUID))
    }

    /// Subscribe to the notify characteristic.
    ///
    /// No-op when already subscribed or when the device has no notify
    /// characteristic.
    pub async fn enable_notifications(&mut self) -> Result<()> {
        let capacity = self.notification_capacity;
        let session = self.session.as_mut().ok_or(Error::NotConnected)?;

        let Some(notify_uuid) = session.notify_uuid else {
            debug!("No notify characteristic found, skipping notifications");
            return Ok(());
        };
        if session.notifications.is_some() {
            return Ok(());
        }

        let (tx, rx) = async_channel::bounded(capacity);
        session
            .link
            .subscribe(notify_uuid, tx)
            .await
            .map_err(|e| Error::transport("subscribe", e))?;
        session.notifications = Some(rx);
        self.state.set_notifications_enabled(true);

        info!("Notifications enabled on {}", notify_uuid);
        Ok(())
    }

    /// Tear the session down. Never fails; link errors are only logged.
    pub async fn disconnect(&mut self) {
        let Some(mut session) = self.session.take() else {
            self.state.reset();
            return;
        };
        self.state.set_connection(ConnectionState::Disconnecting);

        if session.notifications.take().is_some() {
            if let Some(uuid) = session.notify_uuid {
                if let Err(e) = session.link.unsubscribe(uuid).await {
                    warn!("Failed to disable notifications: {}", e);
                }
            }
        }

        if let Err(e) = session.link.disconnect().await {
            warn!("Error during disconnect: {}", e);
        }

        self.state.reset();
        info!("Disconnected from {}", self.address);
    }

    /// List every characteristic of the connected device.
    pub async fn characteristics(&self) -> Result<Vec<CharacteristicInfo>> {
        self.session()?
            .link
            .characteristics()
            .await
            .map_err(|e| Error::transport("discover characteristics", e))
    }
}

/// Resets the shared state unless disarmed, so an abandoned connect does
/// not leave it stuck in `Connecting`.
struct ResetOnDrop {
    state: Arc<SessionState>,
    armed: bool,
}

impl ResetOnDrop {
    fn new(state: Arc<SessionState>) -> Self {
        Self { state, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ResetOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.state.reset();
        }
    }
}

/// Pick the write and notify characteristics from a discovery listing.
///
/// The known UUIDs win; otherwise the first writable and the first
/// notifying characteristic are used. `None` when nothing is writable.
pub fn select_characteristics(characteristics: &[CharacteristicInfo]) -> Option<(Uuid, Option<Uuid>)> {
    let has = |uuid: Uuid| characteristics.iter().any(|c| c.uuid == uuid);

    let write_uuid = if has(WRITE_CHARACTERISTIC_UUID) {
        WRITE_CHARACTERISTIC_UUID
    } else {
        characteristics.iter().find(|c| c.flags.is_writable())?.uuid
    };

    let notify_uuid = if has(NOTIFY_CHARACTERISTIC_UUID) {
        Some(NOTIFY_CHARACTERISTIC_UUID)
    } else {
        characteristics
            .iter()
            .find(|c| c.flags.notify)
            .map(|c| c.uuid)
    };

    Some((write_uuid, notify_uuid))
}
