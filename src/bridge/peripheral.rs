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

//! BLE GATT peripheral link state machine.
//!
//! Tracks the central's connection state, accepts characteristic writes,
//! and queues outbound notifications. The BlueZ bindings in
//! [`super::gatt`] drive the transition events; everything here is
//! transport-agnostic and exercised directly by tests.

use bluer::Address;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::ble_constants::{DESCRIPTOR_ACK, FRAME_QUEUE_DEPTH};
use super::codec;
use super::intercept::CommandInterceptor;
use crate::diag::{DiagnosticSink, Direction};

/// State of the peripheral role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralState {
    /// Radio silent, no service registered.
    Idle,
    /// Advertising, waiting for a central to connect.
    Advertising,
    /// A central is connected.
    Connected,
}

/// Connection fields guarded by one lock: `peer` is `Some` iff `state`
/// is `Connected`.
#[derive(Debug)]
struct Shared {
    state: PeripheralState,
    peer: Option<Address>,
    advertising: bool,
}

/// Receiving ends of the peripheral's frame queues.
pub struct PeripheralChannels {
    /// Frames written by the central, in arrival order.
    pub inbound: mpsc::Receiver<Vec<u8>>,
    /// Payloads queued for delivery as characteristic notifications.
    pub notifications: mpsc::Receiver<Vec<u8>>,
}

/// BLE GATT peripheral link.
pub struct PeripheralLink {
    shared: Mutex<Shared>,
    inbound_tx: mpsc::Sender<Vec<u8>>,
    notify_tx: mpsc::Sender<Vec<u8>>,
    interceptor: CommandInterceptor,
    diag: Arc<dyn DiagnosticSink>,
}

impl PeripheralLink {
    /// Create a new peripheral link with its frame channels.
    pub fn new(
        interceptor: CommandInterceptor,
        diag: Arc<dyn DiagnosticSink>,
    ) -> (Arc<Self>, PeripheralChannels) {
        let (inbound_tx, inbound_rx) = mpsc::channel(FRAME_QUEUE_DEPTH);
        let (notify_tx, notify_rx) = mpsc::channel(FRAME_QUEUE_DEPTH);

        let link = Arc::new(Self {
            shared: Mutex::new(Shared {
                state: PeripheralState::Idle,
                peer: None,
                advertising: false,
            }),
            inbound_tx,
            notify_tx,
            interceptor,
            diag,
        });

        (
            link,
            PeripheralChannels {
                inbound: inbound_rx,
                notifications: notify_rx,
            },
        )
    }

    pub fn state(&self) -> PeripheralState {
        self.shared.lock().state
    }

    pub fn peer(&self) -> Option<Address> {
        self.shared.lock().peer
    }

    /// Advertising is up; an idle link starts waiting for a central.
    pub fn advertising_started(&self) {
        let mut shared = self.shared.lock();
        shared.advertising = true;
        if shared.state == PeripheralState::Idle {
            shared.state = PeripheralState::Advertising;
        }
    }

    /// Advertising handle released.
    pub fn advertising_stopped(&self) {
        let mut shared = self.shared.lock();
        shared.advertising = false;
        if shared.state == PeripheralState::Advertising {
            shared.state = PeripheralState::Idle;
        }
    }

    /// A central connected.
    pub fn peer_connected(&self, peer: Address) {
        let mut shared = self.shared.lock();
        shared.state = PeripheralState::Connected;
        shared.peer = Some(peer);
    }

    /// The central disconnected; fall back to advertising if it is still up.
    pub fn peer_disconnected(&self) {
        let mut shared = self.shared.lock();
        shared.peer = None;
        shared.state = if shared.advertising {
            PeripheralState::Advertising
        } else {
            PeripheralState::Idle
        };
    }

    /// Handle one characteristic write from the central.
    ///
    /// The payload is forwarded to the inbound queue immediately; a
    /// matching interceptor rule then stalls the acknowledgement path
    /// (this method's completion) without touching the forwarded bytes.
    pub async fn characteristic_written(&self, payload: Vec<u8>) {
        self.diag.frame(Direction::GattRx, &payload);
        let delay = self.interceptor.ack_delay(&payload);

        // Forward regardless of the serial link's state; the router owns
        // the drop policy. A closed queue means teardown has begun.
        let _ = self.inbound_tx.send(payload).await;

        if let Some(delay) = delay {
            self.diag
                .event(&format!("intercepted command, delaying ack {} ms", delay.as_millis()));
            tokio::time::sleep(delay).await;
        }
    }

    /// Handle a client-configuration descriptor write.
    ///
    /// Always succeeds; the returned bytes acknowledge the write.
    pub fn descriptor_written(&self, value: &[u8]) -> &'static [u8] {
        self.diag.event(&codec::render_frame("CCCD write", value));
        DESCRIPTOR_ACK
    }

    /// Queue a payload for delivery as a characteristic notification.
    ///
    /// Fire-and-forget: never waits on the central. Dropped with a
    /// diagnostic when no central is connected or the notifier queue is
    /// unavailable.
    pub fn notify(&self, payload: Vec<u8>) {
        let connected = self.shared.lock().state == PeripheralState::Connected;
        if !connected {
            self.diag.frame(Direction::GattTxDropped, &payload);
            return;
        }

        self.diag.frame(Direction::GattTx, &payload);
        if let Err(err) = self.notify_tx.try_send(payload) {
            self.diag
                .event(&format!("notification queue unavailable: {}", err));
        }
    }
}
