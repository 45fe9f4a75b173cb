/// Status lines reported by the board to whatever listens on the console.
///
/// All messages are newline-delimited JSON (NDJSON), serialized without
/// allocation through `serde-json-core`.
use heapless::Vec;
use serde::Serialize;

/// Messages sent from the board
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum DeviceMessage {
    /// Board descriptor, sent once after startup
    #[serde(rename = "board")]
    Board {
        name: &'static str,
        version: &'static str,
        input_rate: u32,
        output_rate: u32,
        duplex: bool,
        /// Whether a panel answered during display resolution
        display: bool,
        /// Bus address of the panel, `null` when absent
        display_address: Option<u8>,
    },
    /// Lifecycle state change
    #[serde(rename = "state")]
    State { state: &'static str },
    /// Recognized button gesture and the session command it produced
    #[serde(rename = "gesture")]
    Gesture {
        gesture: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        command: Option<&'static str>,
        /// Uptime in milliseconds
        ts: u32,
    },
}

/// Firmware version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 256;

/// Buffer type for serialized JSON messages
pub type MsgBuffer = Vec<u8, MAX_MSG_LEN>;

/// Serialize a message into `buf` followed by a newline. Returns the total
/// length, or `None` if it does not fit.
pub fn serialize_message(msg: &DeviceMessage, buf: &mut [u8]) -> Option<usize> {
    match serde_json_core::to_slice(msg, buf) {
        Ok(len) if len < buf.len() => {
            buf[len] = b'\n';
            Some(len + 1)
        }
        _ => None,
    }
}

/// Serialize a message into a fixed-capacity line buffer.
pub fn to_line(msg: &DeviceMessage) -> Option<MsgBuffer> {
    let mut buf = [0u8; MAX_MSG_LEN];
    let len = serialize_message(msg, &mut buf)?;
    Vec::from_slice(&buf[..len]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(msg: &DeviceMessage) -> std::string::String {
        let line = to_line(msg).unwrap();
        std::string::String::from_utf8(line.to_vec()).unwrap()
    }

    #[test]
    fn board_descriptor_with_display() {
        let msg = DeviceMessage::Board {
            name: "esp32c3-inmp441",
            version: "0.1.0",
            input_rate: 16_000,
            output_rate: 24_000,
            duplex: true,
            display: true,
            display_address: Some(0x3C),
        };
        assert_eq!(
            json(&msg),
            "{\"type\":\"board\",\"name\":\"esp32c3-inmp441\",\"version\":\"0.1.0\",\
             \"input_rate\":16000,\"output_rate\":24000,\"duplex\":true,\
             \"display\":true,\"display_address\":60}\n"
        );
    }

    #[test]
    fn absent_display_reports_null_address() {
        let msg = DeviceMessage::Board {
            name: "esp32c3-inmp441",
            version: VERSION,
            input_rate: 16_000,
            output_rate: 24_000,
            duplex: true,
            display: false,
            display_address: None,
        };
        let s = json(&msg);
        assert!(s.contains(r#""display":false"#));
        assert!(s.contains(r#""display_address":null"#));
    }

    #[test]
    fn gesture_without_command_omits_field() {
        let msg = DeviceMessage::Gesture {
            gesture: "click",
            command: None,
            ts: 1200,
        };
        assert_eq!(json(&msg), "{\"type\":\"gesture\",\"gesture\":\"click\",\"ts\":1200}\n");
    }

    #[test]
    fn state_message() {
        let msg = DeviceMessage::State { state: "listening" };
        assert_eq!(json(&msg), "{\"type\":\"state\",\"state\":\"listening\"}\n");
    }

    #[test]
    fn too_small_buffer_fails() {
        let msg = DeviceMessage::State { state: "listening" };
        let mut buf = [0u8; 8];
        assert_eq!(serialize_message(&msg, &mut buf), None);
    }

    #[test]
    fn version_is_semver() {
        let parts: heapless::Vec<&str, 4> = VERSION.split('.').collect();
        assert_eq!(parts.len(), 3, "VERSION should be semver (major.minor.patch)");
        for part in &parts {
            assert!(part.parse::<u32>().is_ok(), "'{part}' is not a number");
        }
    }
}
