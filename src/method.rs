//! Correlates outbound method calls to inbound results; enforces
//! per-call timeout and cancellation (spec §4.6). Grounded on the
//! teacher's `ws_client::manager::TaskManager`
//! (`insert_pending_method_call`/`complete_pending_method_call`),
//! generalized from JSON-RPC numeric ids to DDP's client-generated string
//! ids, and on the original's `method_manager.py` for the result/error
//! split.

use std::collections::HashMap;
use std::time::Instant;

use futures::channel::oneshot;
use serde_json::Value;

use crate::error::{DdpError, MethodError, Result};
use crate::message::Id;

type Resolver = oneshot::Sender<Result<Value>>;

struct PendingMethod {
    resolver: Resolver,
    deadline: Instant,
}

/// Tracks outstanding `method` calls.
#[derive(Default)]
pub struct MethodRegistry {
    pending: HashMap<Id, PendingMethod>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }

    /// Registers a pending call. Must happen before the `method` frame is
    /// sent (spec §4.6 step 1).
    pub fn insert(&mut self, id: Id, deadline: Instant, resolver: Resolver) {
        self.pending.insert(id, PendingMethod { resolver, deadline });
    }

    /// Inbound `result{id, result?, error?}`. Fulfills and removes the
    /// matching pending call, if any is still outstanding. A result for an
    /// unknown/already-resolved id is ignored.
    pub fn on_result(&mut self, id: &str, result: Option<Value>, error: Option<Value>) {
        let pending = match self.pending.remove(id) {
            Some(pending) => pending,
            None => return,
        };
        let outcome = match error {
            Some(error_value) => match serde_json::from_value::<MethodError>(error_value.clone()) {
                Ok(method_error) => Err(DdpError::Method(method_error)),
                Err(_) => Err(DdpError::Method(MethodError {
                    error: error_value,
                    reason: None,
                    message: None,
                    error_type: None,
                    details: None,
                })),
            },
            None => Ok(result.unwrap_or(Value::Null)),
        };
        let _ = pending.resolver.send(outcome);
    }

    /// Removes and fails a single pending call immediately, e.g. when the
    /// `method` frame itself couldn't be sent.
    pub fn fail(&mut self, id: &str, err: DdpError) {
        if let Some(pending) = self.pending.remove(id) {
            let _ = pending.resolver.send(Err(err));
        }
    }

    /// Removes and fails every pending call whose deadline has passed,
    /// with [`DdpError::Timeout`].
    pub fn expire(&mut self, now: Instant) {
        let expired: Vec<Id> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in expired {
            if let Some(pending) = self.pending.remove(&id) {
                let _ = pending.resolver.send(Err(DdpError::Timeout));
            }
        }
    }

    /// The earliest outstanding deadline, if any — used to size the
    /// dispatcher's next timer tick.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Removes and fails every pending call with `err`, e.g. on `close()`
    /// or transport drop (spec §4.6's "on close or socket drop" clause;
    /// spec P5/P6).
    pub fn cancel_all(&mut self, make_err: impl Fn() -> DdpError) {
        for (_, pending) in self.pending.drain() {
            let _ = pending.resolver.send(Err(make_err()));
        }
    }

    /// Whether any call is still outstanding.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
