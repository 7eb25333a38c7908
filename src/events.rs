//! Public event surface: `on`/`off` topic subscriptions plus the
//! synthesized `collection_*` and `collection:<name>:*` topics (spec
//! §4.9, §6). Generalizes the original's `pyee`-style emitter mixin into
//! a small typed bus, per spec §9's Design Notes.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::cache::{CacheEvent, Fields};

/// One public event delivered to an `on(...)` handler.
#[derive(Clone, Debug)]
pub enum Event {
    /// Session reached `OPEN`.
    Connected,
    /// Session left `OPEN` (transport dropped, or `close()`).
    Disconnected,
    /// A document was added to a collection.
    Added {
        collection: String,
        id: String,
        fields: Fields,
    },
    /// Fields on an existing document changed.
    Changed {
        collection: String,
        id: String,
        fields: Fields,
        cleared: Vec<String>,
    },
    /// A document was removed from a collection.
    Removed { collection: String, id: String },
    /// `updated{methods}` — observed only, no effect on `result`
    /// visibility (spec §4.6, §9's open question).
    MethodsUpdated(Vec<String>),
    /// An asynchronous failure not tied to a specific call, e.g. a
    /// `nosub` on an already-active subscription.
    Error(String),
}

/// Opaque handle returned by [`EventBus::on`], passed back to
/// [`EventBus::off`] to unregister.
pub type HandlerId = u64;

type Handler = Box<dyn FnMut(&Event) + Send>;

/// A topic-keyed, multi-consumer event bus.
///
/// A handler that panics is isolated — logged, and does not prevent
/// delivery to the rest, nor propagate to the dispatcher (spec §7).
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<String, Vec<(HandlerId, Handler)>>,
    next_id: HandlerId,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            next_id: 0,
        }
    }

    /// Registers `handler` for `topic`, returning an id usable with
    /// [`off`](Self::off).
    pub fn on(&mut self, topic: impl Into<String>, handler: impl FnMut(&Event) + Send + 'static) -> HandlerId {
        let id = self.next_id;
        self.next_id += 1;
        self.handlers
            .entry(topic.into())
            .or_insert_with(Vec::new)
            .push((id, Box::new(handler)));
        id
    }

    /// Unregisters a handler previously returned by [`on`](Self::on).
    pub fn off(&mut self, topic: &str, id: HandlerId) {
        if let Some(handlers) = self.handlers.get_mut(topic) {
            handlers.retain(|(hid, _)| *hid != id);
        }
    }

    /// Delivers `event` to every handler registered for `topic`.
    pub fn emit(&mut self, topic: &str, event: &Event) {
        if let Some(handlers) = self.handlers.get_mut(topic) {
            for (_, handler) in handlers.iter_mut() {
                if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                    log::error!("event handler panicked for topic \"{}\"", topic);
                }
            }
        }
    }

    /// Emits a plain session/lifecycle event under its own name.
    pub fn emit_simple(&mut self, topic: &str, event: Event) {
        self.emit(topic, &event);
    }

    /// Emits a [`CacheEvent`] under all of the topics spec §4.9/§6 name:
    /// the bare kind (`added`/`changed`/`removed`), the `collection_*`
    /// alias, and the per-collection `collection:<name>:*` topic.
    pub fn emit_cache_event(&mut self, cache_event: &CacheEvent) {
        let (kind, event, collection) = match cache_event.clone() {
            CacheEvent::Added { collection, id, fields } => (
                "added",
                Event::Added {
                    collection: collection.clone(),
                    id,
                    fields,
                },
                collection,
            ),
            CacheEvent::Changed {
                collection,
                id,
                fields,
                cleared,
            } => (
                "changed",
                Event::Changed {
                    collection: collection.clone(),
                    id,
                    fields,
                    cleared,
                },
                collection,
            ),
            CacheEvent::Removed { collection, id } => (
                "removed",
                Event::Removed {
                    collection: collection.clone(),
                    id,
                },
                collection,
            ),
        };
        self.emit(kind, &event);
        self.emit(&format!("collection_{}", kind), &event);
        self.emit(&format!("collection:{}:{}", collection, kind), &event);
    }
}
