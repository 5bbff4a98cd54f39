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

//! Bluetooth UUIDs and transport constants for the OBD2 bridge.

use std::time::Duration;
use uuid::Uuid;

/// GATT service UUID advertised to the central (ELM327-style adapter service).
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x000018f0_0000_1000_8000_00805f9b34fb);

/// Data characteristic UUID (central writes requests, bridge notifies responses).
/// Properties: Write, Notify
pub const CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x5d041c74_e598_488d_9349_e68a2996a1d1);

/// Client characteristic configuration descriptor UUID.
/// BlueZ owns this descriptor; subscription callbacks stand in for writes to it.
pub const CCCD_UUID: Uuid = Uuid::from_u128(0x00002902_0000_1000_8000_00805f9b34fb);

/// Standard SPP UUID of the RFCOMM serial service on the bonded adapter.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805f9b34fb);

/// Default RFCOMM channel for SPP.
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

/// Acknowledgement bytes for client-configuration descriptor writes.
pub const DESCRIPTOR_ACK: &[u8] = b"OK\r\n";

/// Bridge timing constants.
pub mod timing {
    use super::Duration;

    /// Delay applied to the acknowledgement of an intercepted `ATZ\r` reset.
    pub const RESET_ACK_DELAY: Duration = Duration::from_millis(500);

    /// Pause after each delivered serial frame to bound the relay rate.
    pub const INTER_READ_PAUSE: Duration = Duration::from_millis(10);
}

/// Serial read buffer capacity; each read delivers 1..=32 bytes as one frame.
pub const SERIAL_READ_BUFFER: usize = 32;

/// Depth of the per-link frame queues between the links and the router.
pub const FRAME_QUEUE_DEPTH: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        assert_eq!(
            SERVICE_UUID.to_string().to_lowercase(),
            "000018f0-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            CHARACTERISTIC_UUID.to_string().to_lowercase(),
            "5d041c74-e598-488d-9349-e68a2996a1d1"
        );
        assert_eq!(
            CCCD_UUID.to_string().to_lowercase(),
            "00002902-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            SPP_UUID.to_string().to_lowercase(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
    }
}
