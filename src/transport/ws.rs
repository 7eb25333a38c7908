//! WebSocket-backed [`Transport`], grounded on the teacher's
//! `ws_client::task::{WsSender, WsReceiver}` split-sink/stream idiom,
//! generalized from a request/response backend wire-up to a plain
//! frame-in/frame-out channel (DDP's routing happens above this layer).

#[cfg(feature = "ws-async-std")]
use async_tungstenite::async_std::{connect_async, ConnectStream};
#[cfg(feature = "ws-tokio")]
use async_tungstenite::tokio::{connect_async, ConnectStream};
use async_tungstenite::{
    tungstenite::{handshake::client::Request as HandshakeRequest, protocol::Message},
    WebSocketStream,
};
use async_trait::async_trait;
use futures::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{DdpError, Result};
use crate::transport::{ConnectionState, Transport, TransportEvent};

type WsSink = SplitSink<WebSocketStream<ConnectStream>, Message>;
type WsStream = SplitStream<WebSocketStream<ConnectStream>>;

/// A WebSocket [`Transport`], backed by `async-tungstenite` on either the
/// tokio or async-std runtime (feature-selected, as the teacher does for
/// its HTTP/WS transports).
pub struct WsConnection {
    sink: WsSink,
    stream: WsStream,
    state: ConnectionState,
    closed_emitted: bool,
}

impl WsConnection {
    /// Connects to `url`, sending `headers` as part of the HTTP upgrade
    /// handshake.
    pub async fn connect(url: impl Into<String>, headers: HeaderMap) -> Result<Self> {
        let url = url.into();
        let mut builder = HandshakeRequest::get(&url);
        let request_headers = builder
            .headers_mut()
            .expect("HandshakeRequest just created");
        request_headers.extend(headers);
        let request = builder
            .body(())
            .map_err(|e| DdpError::Transport(format!("invalid handshake request: {}", e)))?;

        log::debug!("websocket handshake: {}", url);
        let (ws_stream, response) = connect_async(request).await.map_err(DdpError::from)?;
        log::debug!("websocket handshake response: {:?}", response);
        let (sink, stream) = ws_stream.split();
        Ok(Self {
            sink,
            stream,
            state: ConnectionState::Connected,
            closed_emitted: false,
        })
    }
}

#[async_trait]
impl Transport for WsConnection {
    async fn send(&mut self, frame: String) -> Result<()> {
        if self.state != ConnectionState::Connected {
            return Err(DdpError::Transport(
                "cannot send while disconnected".to_string(),
            ));
        }
        log::trace!("[transport] send: {}", frame);
        self.sink
            .feed(Message::Text(frame))
            .await
            .map_err(DdpError::from)?;
        self.sink.flush().await.map_err(DdpError::from)
    }

    async fn close(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        let _ = self.sink.close().await;
        self.state = ConnectionState::Disconnected;
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        if self.state == ConnectionState::Disconnected {
            return None;
        }
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    log::trace!("[transport] recv: {}", text);
                    return Some(TransportEvent::Frame(text));
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Binary(bytes))) => {
                    log::warn!("[transport] ignoring unexpected binary frame ({} bytes)", bytes.len());
                    continue;
                }
                Some(Ok(Message::Close(frame))) => {
                    log::debug!("[transport] peer closed: {:?}", frame);
                    self.state = ConnectionState::Disconnected;
                    self.closed_emitted = true;
                    return Some(TransportEvent::StateChange(ConnectionState::Disconnected));
                }
                Some(Err(err)) => {
                    log::warn!("[transport] stream error, treating as disconnect: {}", err);
                    self.state = ConnectionState::Disconnected;
                    self.closed_emitted = true;
                    return Some(TransportEvent::StateChange(ConnectionState::Disconnected));
                }
                None => {
                    if self.closed_emitted {
                        return None;
                    }
                    self.state = ConnectionState::Disconnected;
                    self.closed_emitted = true;
                    return Some(TransportEvent::StateChange(ConnectionState::Disconnected));
                }
            }
        }
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}

/// Builds a basic-auth `Authorization` header value, mirroring the
/// teacher's `WsTransportBuilder::basic_auth`.
pub fn basic_auth_header(username: impl std::fmt::Display, password: Option<impl std::fmt::Display>) -> (HeaderName, HeaderValue) {
    let encoded = match password {
        Some(password) => base64::encode(format!("{}:{}", username, password)),
        None => base64::encode(format!("{}:", username)),
    };
    let value = HeaderValue::from_str(&format!("Basic {}", encoded)).expect("basic auth header value");
    (http::header::AUTHORIZATION, value)
}
