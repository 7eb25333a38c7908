//! Single duplex frame channel: connect, send, receive, close; emits
//! connection-state transitions (spec §4.1).

#[cfg(any(feature = "ws-async-std", feature = "ws-tokio"))]
mod ws;

#[cfg(any(feature = "ws-async-std", feature = "ws-tokio"))]
pub use self::ws::{basic_auth_header, WsConnection};

use async_trait::async_trait;

use crate::error::Result;

/// Transport connection state (spec §4.1). Unlike [`crate::session::SessionState`],
/// this tracks the raw socket, not DDP session establishment.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// One event read off the transport: either an inbound frame, or a state
/// transition.
#[derive(Debug)]
pub enum TransportEvent {
    /// A text frame arrived.
    Frame(String),
    /// The connection state changed. Transport guarantees at most one
    /// `Disconnected` transition per connection, emitted exactly once when
    /// the peer (or the underlying socket) closes.
    StateChange(ConnectionState),
}

/// A single duplex frame channel.
///
/// Implementations guarantee: at most one inbound receive operation is
/// outstanding at a time (callers drive `next_event` in a loop and never
/// call it concurrently with itself); `send` fails when not `Connected`;
/// `close` is idempotent and cancels any in-flight receive. Reconnection
/// is never performed internally — that decision belongs to the caller
/// (spec §4.1, §5).
#[async_trait]
pub trait Transport: Send {
    /// Sends one text frame. Fails with [`crate::error::DdpError::Transport`]
    /// if the connection isn't `Connected`.
    async fn send(&mut self, frame: String) -> Result<()>;

    /// Closes the connection. Safe to call more than once or from any
    /// state.
    async fn close(&mut self);

    /// Returns the next inbound frame or state transition, or `None` once
    /// the transport is permanently done (after `close` or a fatal error).
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Current connection state.
    fn state(&self) -> ConnectionState;
}
