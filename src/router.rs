//! Parses frame payloads and dispatches by message kind to registered
//! consumers, dropping unknown kinds silently (spec §4.3).

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::codec;
use crate::message::{MessageKind, ProtocolMessage};

/// Something that wants to observe inbound [`ProtocolMessage`]s of the
/// kinds it's registered for.
pub trait Consumer: Send {
    /// Handles one decoded message. Consumers are expected not to block;
    /// the background dispatcher calls this synchronously between frames
    /// (spec §5's "handlers invoked by the Router run to completion before
    /// the next frame is processed").
    fn handle(&mut self, message: &ProtocolMessage);
}

impl<F> Consumer for F
where
    F: FnMut(&ProtocolMessage) + Send,
{
    fn handle(&mut self, message: &ProtocolMessage) {
        self(message)
    }
}

/// Routes decoded frames to the consumers registered for each message
/// kind, in registration order.
#[derive(Default)]
pub struct Router {
    consumers: HashMap<MessageKind, Vec<Box<dyn Consumer>>>,
}

impl Router {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self {
            consumers: HashMap::new(),
        }
    }

    /// Registers a consumer for a message kind. Consumers registered for
    /// the same kind are delivered to in the order they were registered.
    pub fn register(&mut self, kind: MessageKind, consumer: impl Consumer + 'static) {
        self.consumers
            .entry(kind)
            .or_insert_with(Vec::new)
            .push(Box::new(consumer));
    }

    /// Decodes `frame` once and delivers it to every consumer registered
    /// for its kind. Unknown/malformed frames are dropped silently. A
    /// consumer that panics does not prevent delivery to the rest.
    pub fn dispatch(&mut self, frame: &str) {
        let message = match codec::decode(frame) {
            Some(message) => message,
            None => {
                log::debug!("router: dropping undecodable frame");
                return;
            }
        };
        self.dispatch_message(&message);
    }

    /// Delivers an already-decoded message, as [`dispatch`](Self::dispatch) does.
    pub fn dispatch_message(&mut self, message: &ProtocolMessage) {
        if let Some(consumers) = self.consumers.get_mut(&message.kind()) {
            for consumer in consumers.iter_mut() {
                let result = catch_unwind(AssertUnwindSafe(|| consumer.handle(message)));
                if let Err(_panic) = result {
                    log::error!("router: consumer panicked handling {:?}", message.kind());
                }
            }
        }
    }
}
