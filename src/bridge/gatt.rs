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

//! BlueZ bindings for the peripheral role.
//!
//! Thin glue only: advertisement and GATT application registration, the
//! notifier task draining the link's notification queue, and central
//! connection tracking. All bridge semantics live in
//! [`super::peripheral::PeripheralLink`].

use bluer::adv::{Advertisement, AdvertisementHandle};
use bluer::gatt::local::{
    Application, ApplicationHandle, Characteristic, CharacteristicNotify,
    CharacteristicNotifyMethod, CharacteristicWrite, CharacteristicWriteMethod,
    CharacteristicWriteRequest, Service,
};
use bluer::{Adapter, Address};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::ble_constants::{CHARACTERISTIC_UUID, SERVICE_UUID};
use super::peripheral::{PeripheralLink, PeripheralState};
use crate::error::LinkError;

/// Interval for the BlueZ central connection poll.
const MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Open the default Bluetooth adapter, powering it on if needed.
pub async fn open_adapter() -> bluer::Result<Adapter> {
    let session = bluer::Session::new().await?;
    info!("BlueZ session created");

    let adapter = session.default_adapter().await?;
    info!("Using Bluetooth adapter: {}", adapter.name());

    if !adapter.is_powered().await? {
        info!("Powering on Bluetooth adapter...");
        adapter.set_powered(true).await?;
    }

    Ok(adapter)
}

/// Registered peripheral role: advertisement, GATT application, and the
/// connection monitor. Dropping this stops all three.
pub struct GattPeripheral {
    link: Arc<PeripheralLink>,
    monitor: JoinHandle<()>,
    _adv_handle: AdvertisementHandle,
    _app_handle: ApplicationHandle,
}

impl GattPeripheral {
    /// Advertise the bridge service and register its GATT application.
    ///
    /// `ignore_peer` names a device the connection monitor must not treat
    /// as the central (the bonded serial adapter, typically).
    pub async fn start(
        adapter: &Adapter,
        link: Arc<PeripheralLink>,
        notifications: mpsc::Receiver<Vec<u8>>,
        device_name: &str,
        ignore_peer: impl Fn() -> Option<Address> + Send + Sync + 'static,
    ) -> Result<Self, LinkError> {
        let adv = Advertisement {
            service_uuids: vec![SERVICE_UUID].into_iter().collect(),
            discoverable: Some(true),
            local_name: Some(device_name.to_string()),
            ..Default::default()
        };
        let adv_handle = adapter
            .advertise(adv)
            .await
            .map_err(LinkError::advertise)?;
        info!("BLE advertising started");

        let app_handle = Self::register_gatt_application(adapter, &link, notifications)
            .await
            .map_err(LinkError::advertise)?;
        info!("GATT service registered");

        link.advertising_started();

        let monitor = Self::spawn_connection_monitor(adapter.clone(), link.clone(), ignore_peer);

        Ok(Self {
            link,
            monitor,
            _adv_handle: adv_handle,
            _app_handle: app_handle,
        })
    }

    /// Register one service with one write+notify characteristic. BlueZ
    /// manages the client-configuration descriptor; subscription start
    /// and stop are routed to the link as descriptor writes.
    async fn register_gatt_application(
        adapter: &Adapter,
        link: &Arc<PeripheralLink>,
        notifications: mpsc::Receiver<Vec<u8>>,
    ) -> bluer::Result<ApplicationHandle> {
        let notify_rx = Arc::new(Mutex::new(notifications));

        let data_char = {
            let write_link = link.clone();
            let notify_link = link.clone();

            Characteristic {
                uuid: CHARACTERISTIC_UUID,
                write: Some(CharacteristicWrite {
                    write: true,
                    write_without_response: true,
                    method: CharacteristicWriteMethod::Fun(Box::new(
                        move |data: Vec<u8>, req: CharacteristicWriteRequest| {
                            let link = write_link.clone();
                            Box::pin(async move {
                                debug!(
                                    "characteristic write from {} ({} bytes, mtu {})",
                                    req.device_address,
                                    data.len(),
                                    req.mtu
                                );
                                if link.peer() != Some(req.device_address) {
                                    link.peer_connected(req.device_address);
                                }
                                // Completion of this future is the write
                                // acknowledgement; the link stalls it for
                                // intercepted commands.
                                link.characteristic_written(data).await;
                                Ok(())
                            })
                        },
                    )),
                    ..Default::default()
                }),
                notify: Some(CharacteristicNotify {
                    notify: true,
                    method: CharacteristicNotifyMethod::Fun(Box::new(move |mut notifier| {
                        let notify_rx = notify_rx.clone();
                        let link = notify_link.clone();

                        Box::pin(async move {
                            debug!("notification session started");
                            let _ = link.descriptor_written(&[0x01, 0x00]);

                            loop {
                                let data = {
                                    let mut rx = notify_rx.lock().await;
                                    rx.recv().await
                                };

                                match data {
                                    Some(data) => {
                                        if let Err(err) = notifier.notify(data).await {
                                            error!("Failed to send notification: {}", err);
                                            break;
                                        }
                                    }
                                    None => {
                                        info!("Notification queue closed, exiting notifier");
                                        break;
                                    }
                                }
                            }

                            let _ = link.descriptor_written(&[0x00, 0x00]);
                            debug!("notification session ended");
                        })
                    })),
                    ..Default::default()
                }),
                ..Default::default()
            }
        };

        let app = Application {
            services: vec![Service {
                uuid: SERVICE_UUID,
                primary: true,
                characteristics: vec![data_char],
                ..Default::default()
            }],
            ..Default::default()
        };

        adapter.serve_gatt_application(app).await
    }

    /// Poll BlueZ for the central's connection state. Write requests
    /// already set the peer eagerly; this catches connects with no
    /// traffic yet and disconnects.
    fn spawn_connection_monitor(
        adapter: Adapter,
        link: Arc<PeripheralLink>,
        ignore_peer: impl Fn() -> Option<Address> + Send + Sync + 'static,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(MONITOR_INTERVAL).await;

                let connected = match connected_device(&adapter, ignore_peer()).await {
                    Ok(found) => found,
                    Err(err) => {
                        debug!("connection poll failed: {}", err);
                        continue;
                    }
                };

                match (link.state(), connected) {
                    (PeripheralState::Connected, None) => {
                        info!("BLE central disconnected");
                        link.peer_disconnected();
                    }
                    (PeripheralState::Advertising, Some(addr)) => {
                        info!("BLE central connected: {}", addr);
                        link.peer_connected(addr);
                    }
                    _ => {}
                }
            }
        })
    }
}

impl Drop for GattPeripheral {
    fn drop(&mut self) {
        self.monitor.abort();
        self.link.advertising_stopped();
        self.link.peer_disconnected();
    }
}

/// First connected device other than `ignore`, if any.
async fn connected_device(
    adapter: &Adapter,
    ignore: Option<Address>,
) -> bluer::Result<Option<Address>> {
    for addr in adapter.device_addresses().await? {
        if Some(addr) == ignore {
            continue;
        }
        let device = adapter.device(addr)?;
        if device.is_connected().await.unwrap_or(false) {
            return Ok(Some(addr));
        }
    }
    Ok(None)
}
