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

//! Bridge engine.
//!
//! Two independent link state machines (BLE GATT peripheral, RFCOMM
//! serial client) composed by a router that owns them both; the links
//! never reference each other.

pub mod ble_constants;
pub mod codec;
pub mod gatt;
pub mod intercept;
pub mod peripheral;
pub mod rfcomm;
pub mod router;
pub mod serial;

pub use intercept::{CommandInterceptor, DelayRule};
pub use peripheral::{PeripheralChannels, PeripheralLink, PeripheralState};
pub use router::{BridgeRouter, BridgeState};
pub use serial::{SerialLink, SerialState};
