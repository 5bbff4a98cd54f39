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

//! Diagnostic sink for relay, drop, and fault events.
//!
//! Every component receives a sink at construction; there is no global
//! logging state in the bridge itself.

use parking_lot::Mutex;
use std::time::Instant;
use tracing::info;

use crate::bridge::codec;

/// Direction label attached to each reported frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Characteristic write received from the central.
    GattRx,
    /// Notification sent to the central.
    GattTx,
    /// Notification dropped because no central is connected.
    GattTxDropped,
    /// Chunk read from the RFCOMM stream.
    RfcommRx,
    /// Payload written to the RFCOMM stream.
    RfcommTx,
    /// Payload dropped because the RFCOMM link is down.
    RfcommTxDropped,
}

impl Direction {
    pub fn label(&self) -> &'static str {
        match self {
            Direction::GattRx => "GATT RX",
            Direction::GattTx => "GATT TX",
            Direction::GattTxDropped => "DROPPING GATT TX",
            Direction::RfcommRx => "RFCM RX",
            Direction::RfcommTx => "RFCM TX",
            Direction::RfcommTxDropped => "DROPPING RFCM TX",
        }
    }
}

/// Sink for diagnostic events emitted by the bridge.
///
/// Implementations decide where messages end up; the bridge only defines
/// their shape. Each event carries the sink's own monotonic timestamp.
pub trait DiagnosticSink: Send + Sync {
    /// Report one event message.
    fn event(&self, message: &str);

    /// Report one transferred or dropped frame.
    fn frame(&self, direction: Direction, payload: &[u8]) {
        self.event(&codec::render_frame(direction.label(), payload));
    }
}

/// Production sink forwarding to the `tracing` subscriber.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn event(&self, message: &str) {
        info!(target: "bridge", "{}", message);
    }
}

/// One recorded diagnostic entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub at: Instant,
    pub message: String,
}

/// In-memory sink retaining every event with its arrival instant.
///
/// Stands in for the original adapter's on-screen log view; integration
/// tests assert on its contents.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded messages, in arrival order.
    pub fn messages(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.message.clone()).collect()
    }

    /// Snapshot of all recorded entries, in arrival order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn event(&self, message: &str) {
        self.entries.lock().push(LogEntry {
            at: Instant::now(),
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_labels() {
        assert_eq!(Direction::GattRx.label(), "GATT RX");
        assert_eq!(Direction::RfcommTxDropped.label(), "DROPPING RFCM TX");
    }

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.frame(Direction::GattRx, b"01 0C\r");
        sink.event("RFCOMM connect failed: no bonded devices");

        let messages = sink.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], "GATT RX: 30312030430D='01 0C\r'");
        assert!(messages[1].contains("no bonded devices"));
    }
}
