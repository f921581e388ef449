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

//! BlueZ backed GATT client.

use async_trait::async_trait;
use bluer::gatt::remote::Characteristic;
use bluer::{Adapter, Address, Device};
use futures::{pin_mut, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::link::{
    BleLink, BleTransport, CharacteristicFlags, CharacteristicInfo, LinkError, NotificationSink,
};

/// Controllers seen in the field whose advertised name is not recognisable.
const KNOWN_ADDRESSES: [&str; 2] = ["C8:B9:61:D4:E1:79", "C8:B9:61:06:69:96"];

/// How long to wait for BlueZ to resolve services after connecting.
const SERVICE_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens GATT connections through the default BlueZ adapter.
pub struct BluezTransport {
    _session: bluer::Session,
    adapter: Adapter,
}

impl BluezTransport {
    pub async fn new() -> Result<Self, LinkError> {
        let session = bluer::Session::new().await?;
        info!("BlueZ session created");

        let adapter = session.default_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        if !adapter.is_powered().await? {
            info!("Powering on Bluetooth adapter...");
            adapter.set_powered(true).await?;
        }

        Ok(Self {
            _session: session,
            adapter,
        })
    }

    /// Run discovery for `duration` and list every device the adapter knows.
    ///
    /// Devices advertising `device_name` are flagged as controllers too.
    pub async fn scan(
        &self,
        duration: Duration,
        device_name: &str,
    ) -> Result<Vec<DiscoveredDevice>, LinkError> {
        info!("Scanning for {:?}...", duration);
        let events = self.adapter.discover_devices().await?;
        pin_mut!(events);

        let deadline = tokio::time::Instant::now() + duration;
        while let Ok(Some(_)) = tokio::time::timeout_at(deadline, events.next()).await {}

        let mut devices = Vec::new();
        for address in self.adapter.device_addresses().await? {
            let device = self.adapter.device(address)?;
            let name = device.name().await.ok().flatten();
            let rssi = device.rssi().await.ok().flatten();
            let address = address.to_string();

            devices.push(DiscoveredDevice {
                is_blip: looks_like_blip(name.as_deref(), &address, device_name),
                address,
                name,
                rssi,
            });
        }

        devices.sort_by(|a, b| b.is_blip.cmp(&a.is_blip).then(b.rssi.cmp(&a.rssi)));
        Ok(devices)
    }
}

#[async_trait]
impl BleTransport for BluezTransport {
    type Link = BluezLink;

    async fn connect(&self, address: &str) -> Result<BluezLink, LinkError> {
        let addr: Address = address
            .parse()
            .map_err(|_| LinkError::InvalidAddress(address.to_string()))?;
        let device = self.adapter.device(addr)?;

        if !device.is_connected().await? {
            device.connect().await?;
        }

        if let Err(e) = wait_for_services(&device).await {
            if let Err(close) = device.disconnect().await {
                debug!("Closing half-open link failed: {}", close);
            }
            return Err(e.into());
        }

        Ok(BluezLink {
            device,
            cache: Mutex::new(HashMap::new()),
            notify_tasks: HashMap::new(),
        })
    }
}

/// Give BlueZ time to resolve GATT services; continues unresolved after
/// [`SERVICE_RESOLVE_TIMEOUT`].
async fn wait_for_services(device: &Device) -> bluer::Result<()> {
    let deadline = tokio::time::Instant::now() + SERVICE_RESOLVE_TIMEOUT;
    while !device.is_services_resolved().await? {
        if tokio::time::Instant::now() >= deadline {
            warn!("Services of {} not resolved yet, continuing", device.address());
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Ok(())
}

/// A connected BlueZ device.
pub struct BluezLink {
    device: Device,
    cache: Mutex<HashMap<Uuid, Characteristic>>,
    notify_tasks: HashMap<Uuid, JoinHandle<()>>,
}

impl BluezLink {
    async fn characteristic(&self, uuid: Uuid) -> Result<Characteristic, LinkError> {
        let cached = self.cache.lock().get(&uuid).cloned();
        if let Some(found) = cached {
            return Ok(found);
        }

        for service in self.device.services().await? {
            for characteristic in service.characteristics().await? {
                if characteristic.uuid().await? == uuid {
                    self.cache.lock().insert(uuid, characteristic.clone());
                    return Ok(characteristic);
                }
            }
        }

        Err(LinkError::CharacteristicNotFound(uuid))
    }
}

#[async_trait]
impl BleLink for BluezLink {
    async fn write_characteristic(&self, uuid: Uuid, data: &[u8]) -> Result<(), LinkError> {
        let characteristic = self.characteristic(uuid).await?;
        characteristic.write(data).await?;
        Ok(())
    }

    async fn subscribe(&mut self, uuid: Uuid, sink: NotificationSink) -> Result<(), LinkError> {
        let characteristic = self.characteristic(uuid).await?;
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

        let task = tokio::spawn(async move {
            let stream = match characteristic.notify().await {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            pin_mut!(stream);

            while let Some(value) = stream.next().await {
                match sink.try_send(value) {
                    Ok(()) => {}
                    Err(async_channel::TrySendError::Full(_)) => {
                        warn!("Notification channel full, dropping packet");
                    }
                    Err(async_channel::TrySendError::Closed(_)) => break,
                }
            }
            debug!("Notification stream of {} ended", uuid);
        });

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(LinkError::Other("notification task ended".into())),
        }

        if let Some(previous) = self.notify_tasks.insert(uuid, task) {
            previous.abort();
        }
        Ok(())
    }

    async fn unsubscribe(&mut self, uuid: Uuid) -> Result<(), LinkError> {
        // Dropping the notify stream stops notifications in BlueZ.
        if let Some(task) = self.notify_tasks.remove(&uuid) {
            task.abort();
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), LinkError> {
        for (_, task) in self.notify_tasks.drain() {
            task.abort();
        }
        self.cache.lock().clear();
        self.device.disconnect().await?;
        Ok(())
    }

    async fn characteristics(&self) -> Result<Vec<CharacteristicInfo>, LinkError> {
        let mut found = Vec::new();
        for service in self.device.services().await? {
            let service_uuid = service.uuid().await?;
            for characteristic in service.characteristics().await? {
                let flags = characteristic.flags().await?;
                found.push(CharacteristicInfo {
                    service: service_uuid,
                    uuid: characteristic.uuid().await?,
                    flags: CharacteristicFlags {
                        read: flags.read,
                        write: flags.write,
                        write_without_response: flags.write_without_response,
                        notify: flags.notify,
                        indicate: flags.indicate,
                    },
                });
            }
        }
        Ok(found)
    }
}

impl Drop for BluezLink {
    fn drop(&mut self) {
        for (_, task) in self.notify_tasks.drain() {
            task.abort();
        }
    }
}

/// A device seen during a scan.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DiscoveredDevice {
    pub address: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
    /// Name or address suggests a BLIP controller.
    pub is_blip: bool,
}

/// Name heuristic for scan results.
///
/// Matches `blip`/`bl1ip`, the configured `device_name` (ignoring case), or
/// a known controller address.
pub fn looks_like_blip(name: Option<&str>, address: &str, device_name: &str) -> bool {
    let by_name = name.is_some_and(|name| {
        let name = name.to_lowercase();
        let configured = device_name.trim().to_lowercase();
        name.contains("blip")
            || name.contains("bl1ip")
            || (!configured.is_empty() && name.contains(&configured))
    });
    by_name
        || KNOWN_ADDRESSES
            .iter()
            .any(|known| known.eq_ignore_ascii_case(address))
}
