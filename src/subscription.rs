//! Tracks outstanding subscriptions; resolves on "ready" quorum (spec
//! §4.7). Grounded on the original's `subscription_manager.py` (the
//! ready-bundling handler) and the teacher's
//! `ws_client::manager::TaskManager` pending/active state split.

use std::collections::HashMap;
use std::time::Instant;

use futures::channel::oneshot;
use serde_json::Value;

use crate::error::{DdpError, Result};
use crate::message::Id;

type Resolver = oneshot::Sender<Result<()>>;

struct Entry {
    /// `Some` while waiting for `ready`; taken (and cleared) once fulfilled.
    resolver: Option<Resolver>,
    deadline: Instant,
    active: bool,
}

/// Outcome of an inbound `nosub{id, error?}`.
pub struct NoSubOutcome {
    /// The waiter to fail, if the subscription hadn't become ready yet.
    pub resolver: Option<Resolver>,
    /// Whether the subscription was already active (no waiter to fail —
    /// callers should surface this as an `error` event instead).
    pub was_active: bool,
}

/// Tracks outstanding `sub` requests through to `ready`/`nosub`/`unsub`.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subs: HashMap<Id, Entry>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            subs: HashMap::new(),
        }
    }

    /// Registers a pending subscription. Must happen before the `sub`
    /// frame is sent (spec §4.7 step 1).
    pub fn insert(&mut self, id: Id, deadline: Instant, resolver: Resolver) {
        self.subs.insert(
            id,
            Entry {
                resolver: Some(resolver),
                deadline,
                active: false,
            },
        );
    }

    /// Inbound `ready{subs: [...]}`. May bundle ids from unrelated
    /// subscribe calls and may repeat ids we don't recognize — both are
    /// ignored (spec §4.7).
    pub fn on_ready(&mut self, ids: &[Id]) {
        for id in ids {
            if let Some(entry) = self.subs.get_mut(id) {
                entry.active = true;
                if let Some(resolver) = entry.resolver.take() {
                    let _ = resolver.send(Ok(()));
                }
            }
        }
    }

    /// Inbound `nosub{id, error?}`. Always removes the subscription.
    pub fn on_nosub(&mut self, id: &str, error: Option<Value>) -> NoSubOutcome {
        match self.subs.remove(id) {
            Some(mut entry) => {
                let was_active = entry.active;
                let resolver = entry.resolver.take();
                if let Some(resolver) = resolver {
                    let outcome = match error {
                        Some(err) => DdpError::NoSub(Some(err)),
                        None => DdpError::NoSub(None),
                    };
                    let _ = resolver.send(Err(outcome));
                    NoSubOutcome {
                        resolver: None,
                        was_active,
                    }
                } else {
                    NoSubOutcome {
                        resolver: None,
                        was_active,
                    }
                }
            }
            None => NoSubOutcome {
                resolver: None,
                was_active: false,
            },
        }
    }

    /// Client-initiated `unsubscribe`. Removes bookkeeping; the caller is
    /// responsible for sending the `unsub` frame.
    pub fn remove(&mut self, id: &str) {
        self.subs.remove(id);
    }

    /// Removes and fails every pending (not-yet-ready) subscription whose
    /// deadline has passed, returning their ids so the caller can send
    /// `unsub` for each (spec §4.7's "on timeout, issue unsubscribe").
    pub fn expire(&mut self, now: Instant) -> Vec<Id> {
        let expired: Vec<Id> = self
            .subs
            .iter()
            .filter(|(_, e)| e.resolver.is_some() && e.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            if let Some(entry) = self.subs.remove(id) {
                if let Some(resolver) = entry.resolver {
                    let _ = resolver.send(Err(DdpError::Timeout));
                }
            }
        }
        expired
    }

    /// The earliest outstanding pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.subs
            .values()
            .filter(|e| e.resolver.is_some())
            .map(|e| e.deadline)
            .min()
    }

    /// Fails every pending waiter and drops all bookkeeping — used on
    /// `close()` and on transport drop (spec §4.7, §5: "already-ready
    /// subscriptions are marked inactive" — since nothing can keep them
    /// alive without a transport, this crate tears the whole registry
    /// down rather than retaining inert active entries; see DESIGN.md).
    pub fn cancel_all(&mut self, make_err: impl Fn() -> DdpError) {
        for (_, entry) in self.subs.drain() {
            if let Some(resolver) = entry.resolver {
                let _ = resolver.send(Err(make_err()));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::time::Duration;

    #[test]
    fn ready_bundling_fulfills_listed_ids_only() {
        let mut registry = SubscriptionRegistry::new();
        let (tx_a, rx_a) = oneshot::channel();
        let (tx_b, rx_b) = oneshot::channel();
        registry.insert("sA".into(), Instant::now() + Duration::from_secs(10), tx_a);
        registry.insert("sB".into(), Instant::now() + Duration::from_secs(10), tx_b);
        registry.on_ready(&["sA".to_string(), "sB".to_string(), "unknown".to_string()]);
        assert!(block_on(rx_a).unwrap().is_ok());
        assert!(block_on(rx_b).unwrap().is_ok());
    }

    #[test]
    fn nosub_fails_pending_waiter_with_server_error() {
        let mut registry = SubscriptionRegistry::new();
        let (tx, rx) = oneshot::channel();
        registry.insert("s1".into(), Instant::now() + Duration::from_secs(10), tx);
        registry.on_nosub("s1", Some(serde_json::json!("nope")));
        let err = block_on(rx).unwrap().unwrap_err();
        assert!(matches!(err, DdpError::NoSub(Some(_))));
    }

    #[test]
    fn nosub_on_active_subscription_has_no_waiter_to_fail() {
        let mut registry = SubscriptionRegistry::new();
        let (tx, _rx) = oneshot::channel();
        registry.insert("s1".into(), Instant::now() + Duration::from_secs(10), tx);
        registry.on_ready(&["s1".to_string()]);
        let outcome = registry.on_nosub("s1", None);
        assert!(outcome.was_active);
        assert!(outcome.resolver.is_none());
    }

    #[test]
    fn expire_returns_ids_to_unsubscribe() {
        let mut registry = SubscriptionRegistry::new();
        let (tx, rx) = oneshot::channel();
        registry.insert("s1".into(), Instant::now() - Duration::from_secs(1), tx);
        let expired = registry.expire(Instant::now());
        assert_eq!(expired, vec!["s1".to_string()]);
        assert!(matches!(block_on(rx).unwrap().unwrap_err(), DdpError::Timeout));
    }
}
