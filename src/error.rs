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

//! Link-level error taxonomy.
//!
//! Every failure here is local to the link that detected it and is
//! reported exactly once through the diagnostic sink; none of them aborts
//! the bridge session.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    /// Advertising could not start; the peripheral stays idle and the
    /// caller must retry explicitly.
    #[error("advertising failed: {reason}")]
    Advertise { reason: String },

    /// RFCOMM connect failed (no bonded device, socket creation, or
    /// connect failure). No automatic retry.
    #[error("RFCOMM connect failed: {reason}")]
    Connect { reason: String },

    /// I/O failure that terminated the serial read loop.
    #[error("RFCOMM read loop terminated: {0}")]
    ReadLoop(#[from] std::io::Error),
}

impl LinkError {
    pub fn advertise(err: impl std::fmt::Display) -> Self {
        LinkError::Advertise {
            reason: err.to_string(),
        }
    }

    pub fn connect(err: impl std::fmt::Display) -> Self {
        LinkError::Connect {
            reason: err.to_string(),
        }
    }
}
