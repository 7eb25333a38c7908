//! The single dispatcher task: owns `SessionCtl`, `MethodRegistry`,
//! `SubscriptionRegistry` and `CacheManager` and is the only place that
//! mutates them, satisfying spec §5's single-dispatcher-thread
//! requirement without locks. Generalizes the teacher's
//! `ws_client::task::WsTask::into_task` `select!` loop from a
//! request/response backend to DDP's connect/sub/method/cache fan-out,
//! with deadline-driven timeouts layered on top via `futures-timer`.

use std::time::{Duration, Instant};

use futures::channel::{mpsc, oneshot};
use futures::{FutureExt, StreamExt};

use crate::cache::CacheManager;
use crate::codec;
use crate::error::{DdpError, Result};
use crate::events::{Event, EventBus};
use crate::message::{Id, MessageKind, ProtocolMessage};
use crate::method::MethodRegistry;
use crate::sender::Sender;
use crate::session::{SessionAction, SessionCtl, SessionState};
use crate::subscription::SubscriptionRegistry;
use crate::transport::{ConnectionState, Transport, TransportEvent};

use super::Command;

pub(crate) async fn run(
    mut transport: Box<dyn Transport>,
    mut from_front: mpsc::Receiver<Command>,
    resume_session_id: Option<String>,
    connect_timeout: Duration,
    open_ack: oneshot::Sender<Result<()>>,
) {
    let mut session = SessionCtl::new(resume_session_id);
    let mut methods = MethodRegistry::new();
    let mut subs = SubscriptionRegistry::new();
    let mut cache = CacheManager::new();
    let mut bus = EventBus::new();
    let mut open_ack = Some(open_ack);
    let mut connect_deadline = Some(Instant::now() + connect_timeout);

    match session.open() {
        SessionAction::SendConnect { version, resume_session } => {
            let support: Vec<String> = crate::session::DDP_VERSIONS.iter().map(|s| s.to_string()).collect();
            if Sender::send_connect(&mut *transport, version, support, resume_session)
                .await
                .is_err()
            {
                fulfill_open_ack(&mut open_ack, Err(DdpError::ConnectionLost));
                return;
            }
        }
        _ => unreachable!("SessionCtl::open() always returns SendConnect"),
    }

    loop {
        let sleep_for = next_deadline(connect_deadline, methods.next_deadline(), subs.next_deadline())
            .map(|deadline| deadline.saturating_duration_since(Instant::now()));

        // `select!` polls each branch via `FusedFuture::is_terminated`, so every
        // branch needs one — `.fuse()` them fresh each iteration rather than
        // persisting them, the same way the teacher's `WsTask::into_task` fuses
        // its receiver stream before the loop (`ws_client::task.rs`).
        let mut next_command = from_front.next().fuse();
        let mut next_event = transport.next_event().fuse();
        let mut timer = sleep_tick(sleep_for).fuse();

        futures::select! {
            command = next_command => match command {
                Some(command) => {
                    handle_command(
                        command,
                        &mut *transport,
                        &mut session,
                        &mut methods,
                        &mut subs,
                        &mut cache,
                        &mut bus,
                    )
                    .await;
                    if matches!(session.state(), SessionState::Closed) {
                        break;
                    }
                }
                None => {
                    log::debug!("[ddp] frontend channel dropped; shutting down");
                    break;
                }
            },
            event = next_event => {
                match event {
                    Some(TransportEvent::Frame(frame)) => {
                        handle_frame(
                            &frame,
                            &mut *transport,
                            &mut session,
                            &mut methods,
                            &mut subs,
                            &mut cache,
                            &mut bus,
                            &mut open_ack,
                            &mut connect_deadline,
                        )
                        .await;
                    }
                    Some(TransportEvent::StateChange(ConnectionState::Disconnected)) | None => {
                        log::debug!("[ddp] transport disconnected");
                        session.on_transport_disconnected();
                        session.close();
                        fulfill_open_ack(&mut open_ack, Err(DdpError::ConnectionLost));
                        methods.cancel_all(|| DdpError::ConnectionLost);
                        subs.cancel_all(|| DdpError::ConnectionLost);
                        bus.emit_simple("disconnected", Event::Disconnected);
                        break;
                    }
                    Some(TransportEvent::StateChange(ConnectionState::Connected)) => {}
                }
            },
            _ = timer => {
                let now = Instant::now();
                if let Some(deadline) = connect_deadline {
                    if deadline <= now && session.state() == SessionState::Connecting {
                        session.close();
                        fulfill_open_ack(&mut open_ack, Err(DdpError::Timeout));
                        methods.cancel_all(|| DdpError::Cancelled);
                        subs.cancel_all(|| DdpError::Cancelled);
                        transport.close().await;
                        break;
                    }
                }
                methods.expire(now);
                for id in subs.expire(now) {
                    let _ = Sender::send_unsubscribe(&mut *transport, id).await;
                }
            },
        }
    }
}

fn next_deadline(a: Option<Instant>, b: Option<Instant>, c: Option<Instant>) -> Option<Instant> {
    [a, b, c].into_iter().flatten().min()
}

/// Sleeps until `deadline`, or forever if there's nothing to wait for —
/// the timer branch then never fires and the other two branches of the
/// `select!` decide the next wakeup.
async fn sleep_tick(deadline: Option<Duration>) {
    match deadline {
        Some(duration) => futures_timer::Delay::new(duration).await,
        None => futures::future::pending().await,
    }
}

fn fulfill_open_ack(open_ack: &mut Option<oneshot::Sender<Result<()>>>, outcome: Result<()>) {
    if let Some(ack) = open_ack.take() {
        let _ = ack.send(outcome);
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_command(
    command: Command,
    transport: &mut dyn Transport,
    session: &mut SessionCtl,
    methods: &mut MethodRegistry,
    subs: &mut SubscriptionRegistry,
    cache: &mut CacheManager,
    bus: &mut EventBus,
) {
    match command {
        Command::Call {
            method,
            params,
            timeout,
            resolver,
        } => {
            if session.state() != SessionState::Open {
                let _ = resolver.send(Err(DdpError::NotConnected));
                return;
            }
            let id: Id = uuid::Uuid::new_v4().to_string();
            methods.insert(id.clone(), Instant::now() + timeout, resolver);
            if Sender::send_method(transport, id.clone(), method, params).await.is_err() {
                methods.fail(&id, DdpError::ConnectionLost);
            }
        }
        Command::Subscribe {
            id,
            name,
            params,
            timeout,
            resolver,
        } => {
            if session.state() != SessionState::Open {
                let _ = resolver.send(Err(DdpError::NotConnected));
                return;
            }
            subs.insert(id.clone(), Instant::now() + timeout, resolver);
            if Sender::send_subscribe(transport, id.clone(), name, params).await.is_err() {
                subs.remove(&id);
            }
        }
        Command::Unsubscribe { id, resolver } => {
            if session.state() != SessionState::Open {
                let _ = resolver.send(Err(DdpError::NotConnected));
                return;
            }
            subs.remove(&id);
            let outcome = Sender::send_unsubscribe(transport, id).await;
            let _ = resolver.send(outcome);
        }
        Command::On { topic, handler, resolver } => {
            let id = bus.on(topic, handler);
            let _ = resolver.send(id);
        }
        Command::Off { topic, id, resolver } => {
            bus.off(&topic, id);
            let _ = resolver.send(());
        }
        Command::CacheGet {
            collection,
            id,
            resolver,
        } => {
            let _ = resolver.send(cache.get(&collection, &id));
        }
        Command::CacheCollection { collection, resolver } => {
            let _ = resolver.send(cache.collection(&collection));
        }
        Command::Close { resolver } => {
            session.close();
            transport.close().await;
            methods.cancel_all(|| DdpError::Cancelled);
            subs.cancel_all(|| DdpError::Cancelled);
            let _ = resolver.send(());
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_frame(
    frame: &str,
    transport: &mut dyn Transport,
    session: &mut SessionCtl,
    methods: &mut MethodRegistry,
    subs: &mut SubscriptionRegistry,
    cache: &mut CacheManager,
    bus: &mut EventBus,
    open_ack: &mut Option<oneshot::Sender<Result<()>>>,
    connect_deadline: &mut Option<Instant>,
) {
    let message = match codec::decode(frame) {
        Some(message) => message,
        None => return,
    };
    match message.kind() {
        MessageKind::Connected => {
            if let ProtocolMessage::Connected { session: session_id } = message {
                if session.on_connected(session_id) {
                    *connect_deadline = None;
                    fulfill_open_ack(open_ack, Ok(()));
                    bus.emit_simple("connected", Event::Connected);
                }
            }
        }
        MessageKind::Failed => {
            if let ProtocolMessage::Failed { version } = message {
                match session.on_failed(version) {
                    Ok(SessionAction::SendConnect { version, resume_session }) => {
                        let support: Vec<String> =
                            crate::session::DDP_VERSIONS.iter().map(|s| s.to_string()).collect();
                        let _ = Sender::send_connect(transport, version, support, resume_session).await;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        *connect_deadline = None;
                        fulfill_open_ack(open_ack, Err(err));
                    }
                }
            }
        }
        MessageKind::Ping => {
            if let ProtocolMessage::Ping { id } = message {
                if let SessionAction::SendPong { id } = session.on_ping(id) {
                    let _ = Sender::send_pong(transport, id).await;
                }
            }
        }
        MessageKind::Ready => {
            if let ProtocolMessage::Ready { subs: ids } = message {
                subs.on_ready(&ids);
            }
        }
        MessageKind::NoSub => {
            if let ProtocolMessage::NoSub { id, error } = message {
                let outcome = subs.on_nosub(&id, error.clone());
                if outcome.was_active {
                    bus.emit_simple(
                        "error",
                        Event::Error(format!("subscription {} terminated: {:?}", id, error)),
                    );
                }
            }
        }
        MessageKind::Added => {
            if let ProtocolMessage::Added { collection, id, fields } = message {
                let event = cache.on_added(collection, id, fields);
                bus.emit_cache_event(&event);
            }
        }
        MessageKind::Changed => {
            if let ProtocolMessage::Changed {
                collection,
                id,
                fields,
                cleared,
            } = message
            {
                if let Some(event) = cache.on_changed(collection, id, fields, cleared) {
                    bus.emit_cache_event(&event);
                }
            }
        }
        MessageKind::Removed => {
            if let ProtocolMessage::Removed { collection, id } = message {
                if let Some(event) = cache.on_removed(collection, id) {
                    bus.emit_cache_event(&event);
                }
            }
        }
        MessageKind::Result => {
            if let ProtocolMessage::Result { id, result, error } = message {
                methods.on_result(&id, result, error);
            }
        }
        MessageKind::Updated => {
            if let ProtocolMessage::Updated { methods: ids } = message {
                bus.emit_simple("updated", Event::MethodsUpdated(ids));
            }
        }
        // Client-to-server-only kinds; a conforming server never sends these.
        MessageKind::Connect | MessageKind::Sub | MessageKind::Unsub | MessageKind::Method | MessageKind::Pong => {}
    }
}
