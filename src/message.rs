//! Wire data model: the closed set of DDP message kinds (spec §3, §6).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single DDP subscription or method id, or other opaque string id.
pub type Id = String;

/// The `msg` discriminant of a DDP frame.
///
/// Kept distinct from [`ProtocolMessage`] so the router can key its
/// consumer table on it without matching on the full payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MessageKind {
    Connect,
    Connected,
    Failed,
    Ping,
    Pong,
    Sub,
    Unsub,
    Ready,
    NoSub,
    Added,
    Changed,
    Removed,
    Method,
    Result,
    Updated,
}

impl MessageKind {
    /// Returns the wire string for this kind, e.g. for tests that build
    /// frames by hand.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Connect => "connect",
            MessageKind::Connected => "connected",
            MessageKind::Failed => "failed",
            MessageKind::Ping => "ping",
            MessageKind::Pong => "pong",
            MessageKind::Sub => "sub",
            MessageKind::Unsub => "unsub",
            MessageKind::Ready => "ready",
            MessageKind::NoSub => "nosub",
            MessageKind::Added => "added",
            MessageKind::Changed => "changed",
            MessageKind::Removed => "removed",
            MessageKind::Method => "method",
            MessageKind::Result => "result",
            MessageKind::Updated => "updated",
        }
    }
}

/// A decoded DDP protocol message.
///
/// Unknown `msg` values never produce a `ProtocolMessage`; `codec::decode`
/// returns `None` for them instead (spec §4.2, §4.3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg")]
#[serde(rename_all = "lowercase")]
pub enum ProtocolMessage {
    /// Client -> server: open or resume a session.
    Connect {
        version: String,
        support: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session: Option<String>,
    },
    /// Server -> client: session established.
    Connected { session: String },
    /// Server -> client: requested version rejected, suggesting a fallback.
    Failed { version: String },
    /// Either direction: liveness probe.
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// Either direction: liveness reply.
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    /// Client -> server: open a subscription.
    Sub {
        id: Id,
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        params: Vec<Value>,
    },
    /// Client -> server: tear down a subscription.
    Unsub { id: Id },
    /// Server -> client: subscription initial snapshot complete.
    Ready { subs: Vec<Id> },
    /// Server -> client: subscription rejected or terminated.
    NoSub {
        id: Id,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<Value>,
    },
    /// Server -> client: a document was added to a collection.
    Added {
        collection: String,
        id: Id,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<Map<String, Value>>,
    },
    /// Server -> client: fields on an existing document changed.
    Changed {
        collection: String,
        id: Id,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fields: Option<Map<String, Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cleared: Option<Vec<String>>,
    },
    /// Server -> client: a document was removed from a collection.
    Removed { collection: String, id: Id },
    /// Client -> server: invoke a remote method.
    Method {
        id: Id,
        method: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        params: Vec<Value>,
        #[serde(default, rename = "randomSeed", skip_serializing_if = "Option::is_none")]
        random_seed: Option<Value>,
    },
    /// Server -> client: result of a method call.
    Result {
        id: Id,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<Value>,
    },
    /// Server -> client: data-message side effects of these methods have
    /// been applied; observed only (spec §4.6, §9).
    Updated { methods: Vec<Id> },
}

impl ProtocolMessage {
    /// The [`MessageKind`] of this message, used for router dispatch.
    pub fn kind(&self) -> MessageKind {
        match self {
            ProtocolMessage::Connect { .. } => MessageKind::Connect,
            ProtocolMessage::Connected { .. } => MessageKind::Connected,
            ProtocolMessage::Failed { .. } => MessageKind::Failed,
            ProtocolMessage::Ping { .. } => MessageKind::Ping,
            ProtocolMessage::Pong { .. } => MessageKind::Pong,
            ProtocolMessage::Sub { .. } => MessageKind::Sub,
            ProtocolMessage::Unsub { .. } => MessageKind::Unsub,
            ProtocolMessage::Ready { .. } => MessageKind::Ready,
            ProtocolMessage::NoSub { .. } => MessageKind::NoSub,
            ProtocolMessage::Added { .. } => MessageKind::Added,
            ProtocolMessage::Changed { .. } => MessageKind::Changed,
            ProtocolMessage::Removed { .. } => MessageKind::Removed,
            ProtocolMessage::Method { .. } => MessageKind::Method,
            ProtocolMessage::Result { .. } => MessageKind::Result,
            ProtocolMessage::Updated { .. } => MessageKind::Updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_round_trips() {
        let msg = ProtocolMessage::Connected {
            session: "s1".into(),
        };
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: ProtocolMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn ping_without_id_round_trips() {
        let msg = ProtocolMessage::Ping { id: None };
        let encoded = serde_json::to_string(&msg).unwrap();
        assert!(!encoded.contains("\"id\""));
        let decoded: ProtocolMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn unknown_kind_fails_to_parse() {
        let raw = r#"{"msg":"totally-unknown-kind"}"#;
        let decoded = serde_json::from_str::<ProtocolMessage>(raw);
        assert!(decoded.is_err());
    }

    #[test]
    fn kind_matches_variant() {
        let msg = ProtocolMessage::Ready {
            subs: vec!["a".into()],
        };
        assert_eq!(msg.kind(), MessageKind::Ready);
    }
}
