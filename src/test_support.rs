//! In-memory [`Transport`] used to drive the background dispatcher through
//! scripted frame sequences in unit tests (spec §8's literal end-to-end
//! scenarios), grounded on the shape of the teacher's
//! `#[tokio::test] async fn test_send_request` in `transports/ws.rs` —
//! generalized from "dial a live server" to "inject scripted frames",
//! since a real server isn't reproducible in a unit test.

#![cfg(test)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;

use crate::error::{DdpError, Result};
use crate::transport::{ConnectionState, Transport, TransportEvent};

/// A scripted, in-memory transport. Frames can be queued up front (for a
/// fully-scripted exchange) or pushed later through a [`FakeTransportHandle`]
/// obtained before the transport is handed off to a background task — an
/// `mpsc` channel, rather than a plain queue, so a push after the
/// dispatcher is already parked in `next_event` still wakes it.
pub struct FakeTransport {
    inbound_tx: mpsc::UnboundedSender<TransportEvent>,
    inbound_rx: mpsc::UnboundedReceiver<TransportEvent>,
    sent: Arc<Mutex<Vec<String>>>,
    state: ConnectionState,
}

impl FakeTransport {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded();
        Self {
            inbound_tx,
            inbound_rx,
            sent: Arc::new(Mutex::new(Vec::new())),
            state: ConnectionState::Connected,
        }
    }

    /// Queues a server frame to be returned by a future `next_event` call.
    pub fn push_frame(&mut self, frame: impl Into<String>) {
        let _ = self.inbound_tx.unbounded_send(TransportEvent::Frame(frame.into()));
    }

    /// Queues a disconnect transition.
    pub fn push_disconnect(&mut self) {
        let _ = self
            .inbound_tx
            .unbounded_send(TransportEvent::StateChange(ConnectionState::Disconnected));
    }

    /// Returns every frame sent so far, in order.
    pub fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// A handle that can push scripted frames and read sent frames after
    /// this transport has been moved into a background task.
    pub fn handle(&self) -> FakeTransportHandle {
        FakeTransportHandle {
            inbound_tx: self.inbound_tx.clone(),
            sent: self.sent.clone(),
        }
    }
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&mut self, frame: String) -> Result<()> {
        if self.state != ConnectionState::Connected {
            return Err(DdpError::ConnectionLost);
        }
        self.sent.lock().unwrap().push(frame);
        Ok(())
    }

    async fn close(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        if self.state == ConnectionState::Disconnected {
            return None;
        }
        match self.inbound_rx.next().await {
            Some(event) => {
                if let TransportEvent::StateChange(ConnectionState::Disconnected) = event {
                    self.state = ConnectionState::Disconnected;
                }
                Some(event)
            }
            None => None,
        }
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}

/// A cloneable handle onto a [`FakeTransport`]'s inbound channel and
/// sent-frame log, usable after the transport itself has been moved into
/// a background dispatcher task.
#[derive(Clone)]
pub struct FakeTransportHandle {
    inbound_tx: mpsc::UnboundedSender<TransportEvent>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl FakeTransportHandle {
    pub fn push_frame(&self, frame: impl Into<String>) {
        let _ = self.inbound_tx.unbounded_send(TransportEvent::Frame(frame.into()));
    }

    pub fn push_disconnect(&self) {
        let _ = self
            .inbound_tx
            .unbounded_send(TransportEvent::StateChange(ConnectionState::Disconnected));
    }

    pub fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

/// Polls `check` until it returns `true`, or panics after ~1s — used to
/// wait for the background dispatcher to have sent a frame before
/// scripting the server's reply to it (e.g. a `method`/`sub` frame whose
/// `id` the dispatcher picks itself).
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        futures_timer::Delay::new(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}
