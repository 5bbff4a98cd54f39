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

//! OBD2 BT Bridge daemon.

use anyhow::{anyhow, Result};
use bluer::Address;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use obd2_bt_bridge::bridge::{gatt, rfcomm};
use obd2_bt_bridge::config::Config;
use obd2_bt_bridge::{
    BridgeRouter, CommandInterceptor, DiagnosticSink, PeripheralChannels, PeripheralLink,
    SerialLink, TracingSink,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("obd2_bt_bridge=info".parse().unwrap())
                .add_directive("bridge=info".parse().unwrap()),
        )
        .init();

    info!(
        "Starting OBD2 BT Bridge v{}...",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded");

    let preferred = match config.bluetooth.preferred_device.as_deref() {
        Some(addr) => Some(
            addr.parse::<Address>()
                .map_err(|err| anyhow!("invalid preferred_device address: {}", err))?,
        ),
        None => None,
    };

    // Bring up the adapter
    let adapter = gatt::open_adapter().await?;
    adapter
        .set_alias(config.bluetooth.device_name.clone())
        .await?;
    info!("Bluetooth name set to: {}", config.bluetooth.device_name);

    // Build the bridge: two links, one router, one diagnostic sink
    let diag: Arc<dyn DiagnosticSink> = Arc::new(TracingSink);
    let (peripheral, channels) = PeripheralLink::new(CommandInterceptor::elm327(), diag.clone());
    let PeripheralChannels {
        inbound,
        notifications,
    } = channels;
    let (serial, serial_inbound) = SerialLink::new(diag.clone());
    let mut router = BridgeRouter::start(
        peripheral.clone(),
        serial.clone(),
        inbound,
        serial_inbound,
    );

    // Advertise the GATT service
    let monitor_serial = serial.clone();
    let _gatt = match gatt::GattPeripheral::start(
        &adapter,
        peripheral.clone(),
        notifications,
        &config.bluetooth.device_name,
        move || monitor_serial.peer(),
    )
    .await
    {
        Ok(gatt) => gatt,
        Err(err) => {
            diag.event(&err.to_string());
            return Err(err.into());
        }
    };
    info!(
        "Advertising as '{}', waiting for a central",
        config.bluetooth.device_name
    );

    // One RFCOMM connect attempt; on failure the bridge keeps serving
    // BLE and inbound frames are dropped until a restart.
    serial.connecting();
    match rfcomm::connect_spp(&adapter, preferred, config.bluetooth.rfcomm_channel).await {
        Ok((stream, peer)) => {
            let _read_loop = serial.attach(stream, peer).await;
            info!("RFCOMM connected to {}", peer);
        }
        Err(err) => {
            serial.connect_failed();
            diag.event(&err.to_string());
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    router.shutdown().await;

    info!("OBD2 BT Bridge stopped");
    Ok(())
}
