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

//! Bonded-device lookup and RFCOMM stream factory.
//!
//! The serial side of the bridge is a client toward an already-bonded
//! device (a real OBD2 adapter or a simulator speaking SPP). Note: BlueZ
//! resolves the SPP record when binding by channel; the service UUID is
//! carried here as the documented identity of that record.

use bluer::rfcomm::{SocketAddr, Stream};
use bluer::{Adapter, Address};
use tracing::info;

use super::ble_constants::SPP_UUID;
use crate::error::LinkError;

/// A bonded Bluetooth device.
#[derive(Debug, Clone)]
pub struct BondedDevice {
    pub address: Address,
    pub name: String,
}

/// Enumerate bonded devices known to the adapter.
pub async fn bonded_devices(adapter: &Adapter) -> bluer::Result<Vec<BondedDevice>> {
    let mut devices = Vec::new();

    for addr in adapter.device_addresses().await? {
        let device = adapter.device(addr)?;
        if device.is_paired().await? {
            let name = device.alias().await.unwrap_or_else(|_| addr.to_string());
            devices.push(BondedDevice {
                address: addr,
                name,
            });
        }
    }

    Ok(devices)
}

/// Open an RFCOMM connection to the SPP service of a bonded device.
///
/// Picks `preferred` when given and bonded, otherwise the first bonded
/// device. Every failure surfaces once as [`LinkError::Connect`]; there
/// is no automatic retry.
pub async fn connect_spp(
    adapter: &Adapter,
    preferred: Option<Address>,
    channel: u8,
) -> Result<(Stream, Address), LinkError> {
    let devices = bonded_devices(adapter).await.map_err(LinkError::connect)?;
    if devices.is_empty() {
        return Err(LinkError::Connect {
            reason: "no bonded devices found".to_string(),
        });
    }
    info!("Found {} bonded device(s)", devices.len());

    let target = match preferred {
        Some(addr) => devices
            .iter()
            .find(|d| d.address == addr)
            .ok_or_else(|| LinkError::Connect {
                reason: format!("device {} is not bonded", addr),
            })?,
        None => &devices[0],
    };
    info!(
        "Connecting to {} ({}) for SPP {} on channel {}",
        target.name, target.address, SPP_UUID, channel
    );

    let stream = Stream::connect(SocketAddr::new(target.address, channel))
        .await
        .map_err(LinkError::connect)?;

    Ok((stream, target.address))
}
