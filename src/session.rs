//! Drives version negotiation and liveness; owns session identity
//! (spec §4.5). Grounded on the original's `session_manager.py` and the
//! teacher's one-shot-resolver idiom from `ws_client::mod::WsTransport`.

use crate::error::{DdpError, Result};

/// Versions this client offers, most-preferred first (spec §6).
pub const DDP_VERSIONS: &[&str] = &["1", "pre2", "pre1"];

/// Session lifecycle state (spec §3).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Logical client/server binding (spec §3).
///
/// Invariant: `session_id` is `Some` iff `state == Open`; `current_version`
/// is always a member of `supported_versions`.
#[derive(Clone, Debug)]
pub struct Session {
    pub supported_versions: Vec<String>,
    pub current_version: String,
    pub session_id: Option<String>,
    pub state: SessionState,
}

impl Session {
    fn new(supported_versions: Vec<String>) -> Self {
        let current_version = supported_versions
            .first()
            .cloned()
            .expect("at least one supported version");
        Self {
            supported_versions,
            current_version,
            session_id: None,
            state: SessionState::Idle,
        }
    }
}

/// What the caller (background dispatcher) should do in response to a
/// [`SessionCtl`] transition. `SessionCtl` itself never touches the
/// transport; it's a pure state machine, kept testable in isolation.
#[derive(Debug, PartialEq)]
pub enum SessionAction {
    /// Send `connect{version, support, session?}`.
    SendConnect {
        version: String,
        resume_session: Option<String>,
    },
    /// Send `pong{id}`.
    SendPong { id: Option<String> },
    /// Nothing to do.
    None,
}

/// Drives [`Session`] through spec §4.5's state machine.
pub struct SessionCtl {
    session: Session,
    resume_session_id: Option<String>,
}

impl SessionCtl {
    /// Creates a controller for a fresh session, optionally requesting
    /// resumption of a prior `session_id` (spec §5's reconnection note).
    pub fn new(resume_session_id: Option<String>) -> Self {
        Self {
            session: Session::new(DDP_VERSIONS.iter().map(|s| s.to_string()).collect()),
            resume_session_id,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    /// `open()`: arms the handshake. Caller must actually connect the
    /// transport and act on the returned [`SessionAction`].
    pub fn open(&mut self) -> SessionAction {
        self.session.state = SessionState::Connecting;
        SessionAction::SendConnect {
            version: self.session.current_version.clone(),
            resume_session: self.resume_session_id.clone(),
        }
    }

    /// Inbound `connected{session}`.
    ///
    /// Returns `true` if this fulfills the open-waiter (i.e. we were
    /// `Connecting`).
    pub fn on_connected(&mut self, session_id: String) -> bool {
        if self.session.state != SessionState::Connecting {
            return false;
        }
        self.session.session_id = Some(session_id);
        self.session.state = SessionState::Open;
        true
    }

    /// Inbound `failed{version}`. Accepts the fallback only if it's a
    /// supported version strictly further down the preference list than
    /// the one we just tried — monotone descent, so the server can't
    /// bounce us back and forth forever (spec §4.5's negotiation-loop
    /// note; see DESIGN.md for how this resolves the spec wording against
    /// the literal fallback scenario in spec §8.2).
    pub fn on_failed(&mut self, version: String) -> Result<SessionAction> {
        if self.session.state != SessionState::Connecting {
            return Ok(SessionAction::None);
        }
        let current_idx = self
            .session
            .supported_versions
            .iter()
            .position(|v| *v == self.session.current_version);
        let candidate_idx = self
            .session
            .supported_versions
            .iter()
            .position(|v| *v == version);
        match (current_idx, candidate_idx) {
            (Some(current_idx), Some(candidate_idx)) if candidate_idx > current_idx => {
                self.session.current_version = version.clone();
                Ok(SessionAction::SendConnect {
                    version,
                    resume_session: self.resume_session_id.clone(),
                })
            }
            _ => {
                self.session.state = SessionState::Closing;
                Err(DdpError::VersionNegotiation)
            }
        }
    }

    /// Inbound `ping{id?}`.
    pub fn on_ping(&mut self, id: Option<String>) -> SessionAction {
        SessionAction::SendPong { id }
    }

    /// Transport reported `DISCONNECTED` while `Open` (or `Connecting`).
    pub fn on_transport_disconnected(&mut self) {
        if matches!(self.session.state, SessionState::Closed) {
            return;
        }
        self.session.state = SessionState::Closing;
    }

    /// `close()`: from any state, enters `Closed`.
    pub fn close(&mut self) {
        self.session.state = SessionState::Closed;
        self.session.session_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_then_connected_opens_session() {
        let mut ctl = SessionCtl::new(None);
        assert_eq!(
            ctl.open(),
            SessionAction::SendConnect {
                version: "1".into(),
                resume_session: None,
            }
        );
        assert_eq!(ctl.state(), SessionState::Connecting);
        assert!(ctl.on_connected("s1".into()));
        assert_eq!(ctl.state(), SessionState::Open);
        assert_eq!(ctl.session().session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn failed_falls_back_to_next_supported_version() {
        let mut ctl = SessionCtl::new(None);
        ctl.open();
        let action = ctl.on_failed("pre2".into()).unwrap();
        assert_eq!(
            action,
            SessionAction::SendConnect {
                version: "pre2".into(),
                resume_session: None,
            }
        );
        assert_eq!(ctl.state(), SessionState::Connecting);
        assert_eq!(ctl.session().current_version, "pre2");
    }

    #[test]
    fn failed_with_unsupported_version_errors() {
        let mut ctl = SessionCtl::new(None);
        ctl.open();
        let err = ctl.on_failed("ancient".into()).unwrap_err();
        assert!(matches!(err, DdpError::VersionNegotiation));
    }

    #[test]
    fn failed_back_toward_more_preferred_version_is_a_loop_and_errors() {
        let mut ctl = SessionCtl::new(None);
        ctl.open();
        ctl.on_failed("pre2".into()).unwrap();
        // Server now bounces us back to "1", which we already left behind.
        let err = ctl.on_failed("1".into()).unwrap_err();
        assert!(matches!(err, DdpError::VersionNegotiation));
    }

    #[test]
    fn ping_always_produces_pong_action() {
        let mut ctl = SessionCtl::new(None);
        assert_eq!(
            ctl.on_ping(Some("p7".into())),
            SessionAction::SendPong { id: Some("p7".into()) }
        );
        assert_eq!(ctl.on_ping(None), SessionAction::SendPong { id: None });
    }

    #[test]
    fn close_from_any_state_reaches_closed() {
        let mut ctl = SessionCtl::new(None);
        ctl.close();
        assert_eq!(ctl.state(), SessionState::Closed);
        assert_eq!(ctl.session().session_id, None);
    }
}
