//! Stateless builder for outbound messages (spec §4.4): one operation per
//! outbound kind, each serialized via [`codec::encode`] and handed to a
//! [`Transport`]. Grounded on the original's `message_sender.py` and the
//! teacher's `ws_client::task::WsSender`.

use serde_json::Value;

use crate::codec;
use crate::error::Result;
use crate::message::{Id, ProtocolMessage};
use crate::transport::Transport;

/// Builds and emits outbound DDP messages.
///
/// Preserves no ordering guarantees beyond the transport's own in-order
/// stream (spec §4.4).
pub struct Sender;

impl Sender {
    async fn send(transport: &mut dyn Transport, message: ProtocolMessage) -> Result<()> {
        transport.send(codec::encode(&message)).await
    }

    /// `connect{version, support, session?}`.
    pub async fn send_connect(
        transport: &mut dyn Transport,
        version: impl Into<String>,
        support: Vec<String>,
        session: Option<String>,
    ) -> Result<()> {
        Self::send(
            transport,
            ProtocolMessage::Connect {
                version: version.into(),
                support,
                session,
            },
        )
        .await
    }

    /// `method{id, method, params}`.
    pub async fn send_method(
        transport: &mut dyn Transport,
        id: Id,
        method: impl Into<String>,
        params: Vec<Value>,
    ) -> Result<()> {
        Self::send(
            transport,
            ProtocolMessage::Method {
                id,
                method: method.into(),
                params,
                random_seed: None,
            },
        )
        .await
    }

    /// `sub{id, name, params}`.
    pub async fn send_subscribe(
        transport: &mut dyn Transport,
        id: Id,
        name: impl Into<String>,
        params: Vec<Value>,
    ) -> Result<()> {
        Self::send(
            transport,
            ProtocolMessage::Sub {
                id,
                name: name.into(),
                params,
            },
        )
        .await
    }

    /// `unsub{id}`.
    pub async fn send_unsubscribe(transport: &mut dyn Transport, id: Id) -> Result<()> {
        Self::send(transport, ProtocolMessage::Unsub { id }).await
    }

    /// `pong{id?}`, echoing whatever id (including absent) the `ping` carried.
    pub async fn send_pong(transport: &mut dyn Transport, id: Option<String>) -> Result<()> {
        Self::send(transport, ProtocolMessage::Pong { id }).await
    }
}
