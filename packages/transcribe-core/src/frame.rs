//! Binary frame codec for the upstream Volcengine ASR WebSocket protocol.
//!
//! A frame is three fields concatenated: a 4-byte big-endian `header`, a 4-byte
//! big-endian `payload_length`, and `payload_length` bytes of body. This module is
//! pure: no I/O, no async, independently testable over byte buffers.

use serde_json::Value;

/// Opens the session; body is UTF-8 JSON.
pub const HEADER_FULL_CLIENT: u32 = 0x1110_1000;
/// Non-terminal audio chunk.
pub const HEADER_AUDIO_ONLY: u32 = 0x1120_0000;
/// Terminal audio chunk (possibly empty).
pub const HEADER_AUDIO_LAST: u32 = 0x1122_0000;

/// 200ms of 16kHz/16-bit mono PCM.
pub const CHUNK_SAMPLES: usize = 3200;
/// Byte length of [`CHUNK_SAMPLES`].
pub const CHUNK_BYTES: usize = CHUNK_SAMPLES * 2;

/// Result of decoding one binary frame from the upstream connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedFrame {
    /// Message type `0x0F`: a protocol error frame carrying a big-endian error code.
    Error {
        /// Upstream-reported error code.
        code: u32,
    },
    /// Message type `0x09`: a result frame carrying the current full-transcript snapshot.
    Result {
        /// The decoded `result.text` value, or `None` if the frame carried no usable text.
        text: Option<String>,
        /// Whether this is the terminal frame for the session (`flags == 0x03`).
        terminal: bool,
    },
    /// Any other message type, or a frame too short to parse meaningfully.
    Ignored,
}

/// Encodes a single frame: 4-byte big-endian header, 4-byte big-endian payload length,
/// then the payload bytes.
#[must_use]
pub fn encode(header: u32, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + payload.len());
    buf.extend_from_slice(&header.to_be_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Decodes a server-sent binary frame per the upstream ASR protocol.
///
/// `message_type` is `(data[1] >> 4) & 0x0F`, `flags` is `data[1] & 0x0F`. Malformed or
/// short frames (other than error frames, which are always surfaced) decode to
/// [`DecodedFrame::Ignored`] rather than erroring — the caller simply skips them.
#[must_use]
pub fn decode_server_frame(data: &[u8]) -> DecodedFrame {
    if data.len() < 2 {
        return DecodedFrame::Ignored;
    }

    let message_type = (data[1] >> 4) & 0x0F;
    let flags = data[1] & 0x0F;

    if message_type == 0x0F {
        let code = if data.len() >= 8 {
            u32::from_be_bytes([data[4], data[5], data[6], data[7]])
        } else {
            0
        };
        return DecodedFrame::Error { code };
    }

    if message_type != 0x09 {
        return DecodedFrame::Ignored;
    }

    let terminal = flags == 0x03;

    if data.len() < 12 {
        // No payload to parse, but still report terminal status if this is the
        // last frame the caller will ever see for this message type.
        return DecodedFrame::Result {
            text: None,
            terminal,
        };
    }

    let payload_size =
        u32::from_be_bytes([data[8], data[9], data[10], data[11]]) as usize;
    let payload_start = 12;
    let payload_end = payload_start + payload_size;

    if data.len() < payload_end {
        return DecodedFrame::Result {
            text: None,
            terminal,
        };
    }

    let text = std::str::from_utf8(&data[payload_start..payload_end])
        .ok()
        .and_then(|s| serde_json::from_str::<Value>(s).ok())
        .and_then(|json| extract_result_text(&json));

    DecodedFrame::Result { text, terminal }
}

/// Extracts the `result` field of a decoded JSON body.
///
/// If `result` is an object, its `text` field is used (empty string if absent). If it's a
/// string, it's used as-is. Otherwise, empty. An empty string is not considered a usable
/// result and is mapped to `None`.
fn extract_result_text(json: &Value) -> Option<String> {
    let result = json.get("result")?;
    let text = match result {
        Value::Object(_) => result
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        Value::String(s) => s.clone(),
        _ => String::new(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip_header_and_payload() {
        let payload = br#"{"hello":"world"}"#;
        let frame = encode(HEADER_FULL_CLIENT, payload);
        assert_eq!(&frame[0..4], &HEADER_FULL_CLIENT.to_be_bytes());
        assert_eq!(&frame[4..8], &(payload.len() as u32).to_be_bytes());
        assert_eq!(&frame[8..], payload);
    }

    #[test]
    fn encode_empty_payload() {
        let frame = encode(HEADER_AUDIO_LAST, &[]);
        assert_eq!(frame.len(), 8);
        assert_eq!(&frame[4..8], &0u32.to_be_bytes());
    }

    fn build_result_frame(text: &str, terminal: bool) -> Vec<u8> {
        let body = serde_json::json!({ "result": { "text": text } });
        let payload = serde_json::to_vec(&body).unwrap();
        let message_type_and_flags = (0x09u8 << 4) | if terminal { 0x03 } else { 0x00 };
        let mut frame = vec![0u8, message_type_and_flags, 0, 0];
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(&payload);
        frame
    }

    #[test]
    fn decodes_object_result_text() {
        let frame = build_result_frame("hi there", false);
        match decode_server_frame(&frame) {
            DecodedFrame::Result { text, terminal } => {
                assert_eq!(text.as_deref(), Some("hi there"));
                assert!(!terminal);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decodes_terminal_flag() {
        let frame = build_result_frame("done", true);
        match decode_server_frame(&frame) {
            DecodedFrame::Result { terminal, .. } => assert!(terminal),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decodes_string_result() {
        let body = serde_json::json!({ "result": "plain string" });
        let payload = serde_json::to_vec(&body).unwrap();
        let mut frame = vec![0u8, 0x09 << 4, 0, 0];
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(&payload);

        match decode_server_frame(&frame) {
            DecodedFrame::Result { text, .. } => {
                assert_eq!(text.as_deref(), Some("plain string"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn empty_text_decodes_to_none() {
        let frame = build_result_frame("", false);
        match decode_server_frame(&frame) {
            DecodedFrame::Result { text, .. } => assert_eq!(text, None),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn error_frame_extracts_code() {
        let mut frame = vec![0u8, 0x0F << 4, 0, 0];
        frame.extend_from_slice(&1234u32.to_be_bytes());
        match decode_server_frame(&frame) {
            DecodedFrame::Error { code } => assert_eq!(code, 1234),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn short_error_frame_defaults_code_to_zero() {
        let frame = vec![0u8, 0x0F << 4];
        match decode_server_frame(&frame) {
            DecodedFrame::Error { code } => assert_eq!(code, 0),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn unknown_message_type_is_ignored() {
        let frame = vec![0u8, 0x03 << 4, 0, 0];
        assert_eq!(decode_server_frame(&frame), DecodedFrame::Ignored);
    }

    #[test]
    fn too_short_frame_is_ignored() {
        assert_eq!(decode_server_frame(&[]), DecodedFrame::Ignored);
        assert_eq!(decode_server_frame(&[0u8]), DecodedFrame::Ignored);
    }

    #[test]
    fn malformed_json_decodes_to_none_text() {
        let mut frame = vec![0u8, 0x09 << 4, 0, 0];
        let payload = b"not json";
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(payload);
        match decode_server_frame(&frame) {
            DecodedFrame::Result { text, .. } => assert_eq!(text, None),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn truncated_payload_is_ignored_gracefully() {
        let mut frame = vec![0u8, 0x09 << 4, 0, 0];
        frame.extend_from_slice(&100u32.to_be_bytes());
        frame.extend_from_slice(b"short");
        match decode_server_frame(&frame) {
            DecodedFrame::Result { text, .. } => assert_eq!(text, None),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
