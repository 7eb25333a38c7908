//! Public facade: [`DdpClient`] and [`DdpClientBuilder`] (spec §4.9).
//! Grounded on the teacher's `ws_client::mod::WsTransport`/
//! `WsTransportBuilder` front-handle shape (an `mpsc::Sender` into a
//! spawned background task) and the original's `ddp_client.py` method
//! surface (`connect`, `call`, `subscribe`, `unsubscribe`, `on`/`off`,
//! `close`).

mod background;
#[cfg(test)]
mod tests;

use std::fmt;
use std::time::Duration;

use futures::channel::{mpsc, oneshot};
use futures::SinkExt;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::cache::Fields;
use crate::error::{DdpError, Result};
use crate::events::{Event, HandlerId};
use crate::message::Id;
use crate::transport::Transport;

#[cfg(any(feature = "ws-async-std", feature = "ws-tokio"))]
use crate::transport::WsConnection;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Messages the front handle sends to the background dispatcher task.
pub(crate) enum Command {
    Call {
        method: String,
        params: Vec<Value>,
        timeout: Duration,
        resolver: oneshot::Sender<Result<Value>>,
    },
    Subscribe {
        id: Id,
        name: String,
        params: Vec<Value>,
        timeout: Duration,
        resolver: oneshot::Sender<Result<()>>,
    },
    Unsubscribe {
        id: Id,
        resolver: oneshot::Sender<Result<()>>,
    },
    On {
        topic: String,
        handler: Box<dyn FnMut(&Event) + Send>,
        resolver: oneshot::Sender<HandlerId>,
    },
    Off {
        topic: String,
        id: HandlerId,
        resolver: oneshot::Sender<()>,
    },
    CacheGet {
        collection: String,
        id: String,
        resolver: oneshot::Sender<Option<Fields>>,
    },
    CacheCollection {
        collection: String,
        resolver: oneshot::Sender<std::collections::HashMap<String, Fields>>,
    },
    Close {
        resolver: oneshot::Sender<()>,
    },
}

/// A connected DDP client.
///
/// Cloning shares the same background dispatcher (cheap — it's just
/// another sender into the same channel), mirroring the teacher's
/// `WsTransport`.
#[derive(Clone)]
pub struct DdpClient {
    to_back: mpsc::Sender<Command>,
}

impl fmt::Debug for DdpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DdpClient").finish_non_exhaustive()
    }
}

impl DdpClient {
    /// Connects to `url` with default configuration. Equivalent to
    /// `DdpClient::builder().connect(url)`.
    #[cfg(any(feature = "ws-async-std", feature = "ws-tokio"))]
    pub async fn connect(url: impl Into<String>) -> Result<Self> {
        DdpClientBuilder::new().connect(url).await
    }

    /// Creates a `DdpClientBuilder` to configure a `DdpClient` before
    /// connecting.
    pub fn builder() -> DdpClientBuilder {
        DdpClientBuilder::new()
    }

    /// Wraps an already-connected [`Transport`] directly, bypassing the
    /// WS-specific builder — used by tests to drive the dispatcher
    /// against a scripted transport, and available to callers supplying
    /// their own [`Transport`] impl.
    pub async fn from_transport(transport: Box<dyn Transport>, config: ClientConfig) -> Result<Self> {
        let (to_back, from_front) = mpsc::channel(256);
        let (open_tx, open_rx) = oneshot::channel();
        let task = background::run(
            transport,
            from_front,
            config.resume_session_id,
            config.connect_timeout,
            open_tx,
        );
        #[cfg(feature = "ws-async-std")]
        let _handle = async_std::task::spawn(task);
        #[cfg(feature = "ws-tokio")]
        let _handle = tokio::spawn(task);

        match open_rx.await {
            Ok(Ok(())) => Ok(Self { to_back }),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(DdpError::InternalChannel),
        }
    }

    /// Calls a remote method, waiting up to `timeout` for the matching
    /// `result` (spec §4.6).
    pub async fn call(&self, method: impl Into<String>, params: Vec<Value>, timeout: Duration) -> Result<Value> {
        let (resolver, rx) = oneshot::channel();
        self.send(Command::Call {
            method: method.into(),
            params,
            timeout,
            resolver,
        })
        .await?;
        rx.await.map_err(|_| DdpError::InternalChannel)?
    }

    /// Calls a remote method and deserializes the result into `T`.
    pub async fn call_into<T: DeserializeOwned>(
        &self,
        method: impl Into<String>,
        params: Vec<Value>,
        timeout: Duration,
    ) -> Result<T> {
        let value = self.call(method, params, timeout).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Subscribes to `name`, waiting up to `timeout` for `ready` (spec
    /// §4.7). Returns the subscription id to pass to
    /// [`unsubscribe`](Self::unsubscribe).
    pub async fn subscribe(&self, name: impl Into<String>, params: Vec<Value>, timeout: Duration) -> Result<Id> {
        let id = uuid::Uuid::new_v4().to_string();
        let (resolver, rx) = oneshot::channel();
        self.send(Command::Subscribe {
            id: id.clone(),
            name: name.into(),
            params,
            timeout,
            resolver,
        })
        .await?;
        rx.await.map_err(|_| DdpError::InternalChannel)??;
        Ok(id)
    }

    /// Ends a subscription, sending `unsub` and dropping local bookkeeping.
    pub async fn unsubscribe(&self, id: Id) -> Result<()> {
        let (resolver, rx) = oneshot::channel();
        self.send(Command::Unsubscribe { id, resolver }).await?;
        rx.await.map_err(|_| DdpError::InternalChannel)?
    }

    /// Registers a handler for `topic` (e.g. `"added"`,
    /// `"collection:todos:changed"`, `"connected"`), returning a handle
    /// usable with [`off`](Self::off).
    pub async fn on(&self, topic: impl Into<String>, handler: impl FnMut(&Event) + Send + 'static) -> Result<HandlerId> {
        let (resolver, rx) = oneshot::channel();
        self.send(Command::On {
            topic: topic.into(),
            handler: Box::new(handler),
            resolver,
        })
        .await?;
        rx.await.map_err(|_| DdpError::InternalChannel)
    }

    /// Unregisters a handler previously returned by [`on`](Self::on).
    pub async fn off(&self, topic: impl Into<String>, id: HandlerId) -> Result<()> {
        let (resolver, rx) = oneshot::channel();
        self.send(Command::Off {
            topic: topic.into(),
            id,
            resolver,
        })
        .await?;
        rx.await.map_err(|_| DdpError::InternalChannel)
    }

    /// Reads a single cached document without a server round-trip (spec
    /// §9's Design Notes: the cache is a local read-through view).
    pub async fn get(&self, collection: impl Into<String>, id: impl Into<String>) -> Result<Option<Fields>> {
        let (resolver, rx) = oneshot::channel();
        self.send(Command::CacheGet {
            collection: collection.into(),
            id: id.into(),
            resolver,
        })
        .await?;
        rx.await.map_err(|_| DdpError::InternalChannel)
    }

    /// Reads every cached document in a collection.
    pub async fn collection(&self, collection: impl Into<String>) -> Result<std::collections::HashMap<String, Fields>> {
        let (resolver, rx) = oneshot::channel();
        self.send(Command::CacheCollection {
            collection: collection.into(),
            resolver,
        })
        .await?;
        rx.await.map_err(|_| DdpError::InternalChannel)
    }

    /// Closes the connection: cancels every in-flight call/subscription
    /// with [`DdpError::Cancelled`] and tears down the background task.
    pub async fn close(&self) -> Result<()> {
        let (resolver, rx) = oneshot::channel();
        self.send(Command::Close { resolver }).await?;
        rx.await.map_err(|_| DdpError::InternalChannel)
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.to_back.clone().send(command).await.map_err(|_| DdpError::InternalChannel)
    }
}

/// Configuration consumed by [`DdpClient::from_transport`].
pub struct ClientConfig {
    pub connect_timeout: Duration,
    pub resume_session_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            resume_session_id: None,
        }
    }
}

/// Configures a [`DdpClient`] before connecting, mirroring the teacher's
/// `WsTransportBuilder`.
#[derive(Debug)]
pub struct DdpClientBuilder {
    headers: HeaderMap,
    connect_timeout: Duration,
    resume_session_id: Option<String>,
}

impl Default for DdpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DdpClientBuilder {
    /// Creates a new `DdpClientBuilder`. Same as `DdpClient::builder()`.
    pub fn new() -> Self {
        Self {
            headers: HeaderMap::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            resume_session_id: None,
        }
    }

    /// Enables basic authentication on the WebSocket upgrade handshake.
    pub fn basic_auth<U, P>(self, username: U, password: Option<P>) -> Self
    where
        U: fmt::Display,
        P: fmt::Display,
    {
        let (name, value) = crate::transport::basic_auth_header(username, password);
        self.header(name, value)
    }

    /// Enables bearer authentication on the WebSocket upgrade handshake.
    pub fn bearer_auth<T: fmt::Display>(self, token: T) -> Self {
        let value = HeaderValue::from_str(&format!("Bearer {}", token)).expect("bearer auth header value");
        self.header(http::header::AUTHORIZATION, value)
    }

    /// Adds a header for the handshake request.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Adds headers for the handshake request.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Sets how long `connect()` waits for `connected`/`failed` (and any
    /// version-negotiation retries) before giving up with
    /// [`DdpError::Timeout`]. Default is 10 seconds.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Requests resumption of a prior session id on the initial
    /// `connect{session}` (spec §5's reconnection note).
    pub fn resume_session(mut self, session_id: impl Into<String>) -> Self {
        self.resume_session_id = Some(session_id.into());
        self
    }

    /// Connects to `url`, spawns the background dispatcher, and waits for
    /// the handshake to settle.
    #[cfg(any(feature = "ws-async-std", feature = "ws-tokio"))]
    pub async fn connect(self, url: impl Into<String>) -> Result<DdpClient> {
        let transport = WsConnection::connect(url, self.headers).await?;
        DdpClient::from_transport(
            Box::new(transport),
            ClientConfig {
                connect_timeout: self.connect_timeout,
                resume_session_id: self.resume_session_id,
            },
        )
        .await
    }
}
