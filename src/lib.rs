//! An asynchronous client for DDP (Distributed Data Protocol), the
//! bidirectional, JSON-framed publish/subscribe-plus-RPC protocol
//! Meteor applications speak over WebSocket.
//!
//! A single background task owns the session, method, subscription and
//! cache state; [`DdpClient`] is a cheap, cloneable front handle into it.

#[macro_use]
extern crate log;

mod cache;
mod client;
mod codec;
mod error;
mod events;
pub mod ext_json;
mod message;
mod method;
mod router;
mod sender;
mod session;
mod subscription;
#[cfg(test)]
mod test_support;
mod transport;

pub use self::cache::Fields;
pub use self::client::{ClientConfig, DdpClient, DdpClientBuilder};
pub use self::error::{DdpError, MethodError, Result};
pub use self::events::{Event, HandlerId};
pub use self::message::Id;
pub use self::session::SessionState;
pub use self::transport::{ConnectionState, Transport, TransportEvent};

#[cfg(any(feature = "ws-async-std", feature = "ws-tokio"))]
pub use self::transport::WsConnection;
