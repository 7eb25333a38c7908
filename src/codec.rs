//! Two pure functions: encode/decode a [`ProtocolMessage`] to/from the text
//! frame it travels in (spec §4.2).

use crate::message::ProtocolMessage;

/// Serializes a message to the JSON text carried in a single WebSocket
/// text frame.
///
/// Mirrors the teacher's call sites (`ws_client::task::WsSender::send_request`,
/// `transports::ws::WebSocketTransport::send_request`), which all go
/// through `serde_json::to_string` and treat serialization of an in-spec
/// message as infallible.
pub fn encode(message: &ProtocolMessage) -> String {
    serde_json::to_string(message).expect("`ProtocolMessage` serialization never fails")
}

/// Decodes one text frame into a [`ProtocolMessage`].
///
/// Returns `None` when the payload isn't a JSON object, the `msg` field is
/// missing, or `msg` isn't one of the closed kind set in spec §3 — those
/// frames are dropped for forward compatibility (spec §4.2, §4.3, §7's
/// `DecodeError`).
pub fn decode(frame: &str) -> Option<ProtocolMessage> {
    serde_json::from_str(frame).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trips() {
        let msg = ProtocolMessage::Method {
            id: "m1".into(),
            method: "echo".into(),
            params: vec![serde_json::json!(1), serde_json::json!(2)],
            random_seed: None,
        };
        let frame = encode(&msg);
        assert_eq!(decode(&frame), Some(msg));
    }

    #[test]
    fn decode_non_object_is_none() {
        assert_eq!(decode("[1,2,3]"), None);
        assert_eq!(decode("\"just a string\""), None);
    }

    #[test]
    fn decode_missing_msg_field_is_none() {
        assert_eq!(decode(r#"{"foo":"bar"}"#), None);
    }

    #[test]
    fn decode_unknown_msg_is_none() {
        assert_eq!(decode(r#"{"msg":"frobnicate"}"#), None);
    }

    #[test]
    fn decode_malformed_json_is_none() {
        assert_eq!(decode("{not json"), None);
    }
}
