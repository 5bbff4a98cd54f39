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

//! OBD2 Bluetooth bridge: BLE GATT peripheral on one side, classic
//! RFCOMM serial client on the other, relaying opaque frames between a
//! BLE central (e.g. a diagnostics app) and a bonded OBD2 adapter.

pub mod bridge;
pub mod config;
pub mod diag;
pub mod error;

pub use bridge::{
    BridgeRouter, BridgeState, CommandInterceptor, DelayRule, PeripheralChannels, PeripheralLink,
    PeripheralState, SerialLink, SerialState,
};
pub use diag::{DiagnosticSink, Direction, MemorySink, TracingSink};
pub use error::LinkError;
