//! Extended-JSON tag helpers (spec §6).
//!
//! `serde_json::Value` already round-trips `{"$date": ...}` / `{"$binary":
//! ...}` objects opaquely (and any other `$`-prefixed tag along with them),
//! which satisfies the wire-format requirement on its own. These helpers
//! are for callers that want to work with the typed Rust values a tag
//! represents instead of the raw object.

use serde_json::{Map, Value};

/// Builds the extended-JSON wrapper for a timestamp, in milliseconds
/// since the Unix epoch.
pub fn date_to_value(millis_since_epoch: i64) -> Value {
    let mut map = Map::new();
    map.insert("$date".to_string(), Value::from(millis_since_epoch));
    Value::Object(map)
}

/// Recovers the millisecond timestamp from a `{"$date": ...}` wrapper.
/// Returns `None` if `value` isn't a date wrapper.
pub fn value_to_date(value: &Value) -> Option<i64> {
    value.as_object()?.get("$date")?.as_i64()
}

/// Builds the extended-JSON wrapper for a byte string, base64-encoded.
pub fn binary_to_value(bytes: &[u8]) -> Value {
    let mut map = Map::new();
    map.insert("$binary".to_string(), Value::from(base64::encode(bytes)));
    Value::Object(map)
}

/// Recovers the byte string from a `{"$binary": "<base64>"}` wrapper.
/// Returns `None` if `value` isn't a binary wrapper or isn't valid base64.
pub fn value_to_binary(value: &Value) -> Option<Vec<u8>> {
    let encoded = value.as_object()?.get("$binary")?.as_str()?;
    base64::decode(encoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_round_trips() {
        let value = date_to_value(1_700_000_000_000);
        assert_eq!(value_to_date(&value), Some(1_700_000_000_000));
    }

    #[test]
    fn binary_round_trips() {
        let value = binary_to_value(b"hello");
        assert_eq!(value_to_binary(&value), Some(b"hello".to_vec()));
    }

    #[test]
    fn non_tagged_value_yields_none() {
        let value = Value::from(42);
        assert_eq!(value_to_date(&value), None);
        assert_eq!(value_to_binary(&value), None);
    }

    #[test]
    fn unknown_dollar_tag_passes_through_raw_json() {
        let raw = r#"{"$custom":"opaque"}"#;
        let value: Value = serde_json::from_str(raw).unwrap();
        let encoded = serde_json::to_string(&value).unwrap();
        assert_eq!(encoded, raw);
    }
}
