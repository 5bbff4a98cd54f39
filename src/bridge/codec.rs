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

//! Frame rendering helpers.
//!
//! Every frame crossing the bridge is reported as an uppercase hex string
//! plus a best-effort ASCII rendering. The ASCII form is also what the
//! command interceptor matches against.

/// Marker substituted when a payload is not valid ASCII.
pub const INVALID_MARKER: &str = "<invalid>";

/// Encode a payload as an uppercase hex string without separators.
pub fn to_hex(data: &[u8]) -> String {
    hex::encode_upper(data)
}

/// Decode a hex string produced by [`to_hex`] back into bytes.
pub fn from_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(s)
}

/// Best-effort ASCII rendering of a payload.
///
/// Returns `None` when any byte falls outside the ASCII range; callers
/// substitute [`INVALID_MARKER`] and keep the original bytes.
pub fn ascii_rendering(data: &[u8]) -> Option<String> {
    if data.is_ascii() {
        // Safe: all-ASCII input is valid UTF-8.
        Some(String::from_utf8_lossy(data).into_owned())
    } else {
        None
    }
}

/// Render one frame for the diagnostic sink.
///
/// Shape: `<label>: <HEX>='<ascii>'`, with `<invalid>` (unquoted) standing
/// in for payloads that do not decode as ASCII.
pub fn render_frame(label: &str, data: &[u8]) -> String {
    match ascii_rendering(data) {
        Some(text) => format!("{}: {}='{}'", label, to_hex(data), text),
        None => format!("{}: {}={}", label, to_hex(data), INVALID_MARKER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let payloads: &[&[u8]] = &[b"", b"ATZ\r", b"01 0C\r", &[0x00, 0xFF, 0x7F, 0x80]];
        for payload in payloads {
            let hex = to_hex(payload);
            assert_eq!(from_hex(&hex).unwrap(), *payload);
        }
    }

    #[test]
    fn test_hex_is_uppercase() {
        assert_eq!(to_hex(&[0xAB, 0xCD, 0x0E]), "ABCD0E");
    }

    #[test]
    fn test_ascii_rendering_valid() {
        assert_eq!(ascii_rendering(b"ATZ\r").as_deref(), Some("ATZ\r"));
        assert_eq!(ascii_rendering(b"").as_deref(), Some(""));
    }

    #[test]
    fn test_ascii_rendering_invalid_iff_non_ascii() {
        assert!(ascii_rendering(&[0x41, 0x80]).is_none());
        assert!(ascii_rendering(&[0xFF]).is_none());
        // 0x7F is still ASCII
        assert!(ascii_rendering(&[0x7F]).is_some());
    }

    #[test]
    fn test_render_frame_shapes() {
        assert_eq!(render_frame("GATT RX", b"ATZ\r"), "GATT RX: 41545A0D='ATZ\r'");
        assert_eq!(render_frame("GATT RX", &[0xFF, 0x9A]), "GATT RX: FF9A=<invalid>");
    }
}
