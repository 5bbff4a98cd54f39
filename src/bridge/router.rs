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

//! Bridge router: the only coupling between the two links.
//!
//! Pumps the peripheral's inbound frames into the serial link and the
//! serial link's inbound frames into the peripheral's notifier. The drop
//! policy lives in the links' send operations: frames bound for a
//! disconnected transport are dropped, never queued or retried, and each
//! drop is a diagnostic event rather than an error.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::peripheral::{PeripheralLink, PeripheralState};
use super::serial::{SerialLink, SerialState};

/// Composite snapshot of both links' connection states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeState {
    pub peripheral: PeripheralState,
    pub serial: SerialState,
}

/// Owner of both links for the lifetime of a bridge session.
pub struct BridgeRouter {
    peripheral: Arc<PeripheralLink>,
    serial: Arc<SerialLink>,
    pumps: Vec<JoinHandle<()>>,
}

impl BridgeRouter {
    /// Wire the two links together and start the relay pumps.
    pub fn start(
        peripheral: Arc<PeripheralLink>,
        serial: Arc<SerialLink>,
        mut peripheral_inbound: mpsc::Receiver<Vec<u8>>,
        mut serial_inbound: mpsc::Receiver<Vec<u8>>,
    ) -> Self {
        let serial_out = serial.clone();
        let gatt_to_serial = tokio::spawn(async move {
            while let Some(frame) = peripheral_inbound.recv().await {
                serial_out.write(&frame).await;
            }
        });

        let peripheral_out = peripheral.clone();
        let serial_to_gatt = tokio::spawn(async move {
            while let Some(frame) = serial_inbound.recv().await {
                peripheral_out.notify(frame);
            }
        });

        Self {
            peripheral,
            serial,
            pumps: vec![gatt_to_serial, serial_to_gatt],
        }
    }

    pub fn peripheral(&self) -> &Arc<PeripheralLink> {
        &self.peripheral
    }

    pub fn serial(&self) -> &Arc<SerialLink> {
        &self.serial
    }

    /// Snapshot of both connection states.
    pub fn bridge_state(&self) -> BridgeState {
        BridgeState {
            peripheral: self.peripheral.state(),
            serial: self.serial.state(),
        }
    }

    /// Tear the session down: stop relaying first, then close the serial
    /// link and park the peripheral. No frame is delivered afterwards.
    pub async fn shutdown(&mut self) {
        for pump in self.pumps.drain(..) {
            pump.abort();
        }
        self.serial.close().await;
        self.peripheral.advertising_stopped();
        self.peripheral.peer_disconnected();
    }
}
