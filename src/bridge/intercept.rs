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

//! Command interception rules.
//!
//! Inbound writes from the central are matched against an ordered rule
//! list; a match delays the write acknowledgement, never the forwarded
//! payload. The only built-in rule emulates the reset latency of a real
//! ELM327 adapter on `ATZ\r`.

use std::time::Duration;

use super::ble_constants::timing::RESET_ACK_DELAY;
use super::codec;

/// One interception rule: an exact command text and the ack delay it buys.
#[derive(Debug, Clone)]
pub struct DelayRule {
    pub command: String,
    pub delay: Duration,
}

impl DelayRule {
    pub fn new(command: impl Into<String>, delay: Duration) -> Self {
        Self {
            command: command.into(),
            delay,
        }
    }
}

/// Ordered list of delay rules evaluated against decoded inbound text.
#[derive(Debug, Clone, Default)]
pub struct CommandInterceptor {
    rules: Vec<DelayRule>,
}

impl CommandInterceptor {
    pub fn new(rules: Vec<DelayRule>) -> Self {
        Self { rules }
    }

    /// No rules; every ack completes immediately.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Default ELM327 rule set: `ATZ\r` delays the ack by 500 ms.
    pub fn elm327() -> Self {
        Self::new(vec![DelayRule::new("ATZ\r", RESET_ACK_DELAY)])
    }

    /// Delay to apply before acknowledging `payload`, if any rule matches.
    ///
    /// Payloads that do not decode as ASCII never match and are forwarded
    /// unchanged.
    pub fn ack_delay(&self, payload: &[u8]) -> Option<Duration> {
        let text = codec::ascii_rendering(payload)?;
        self.rules
            .iter()
            .find(|rule| rule.command == text)
            .map(|rule| rule.delay)
    }
}
