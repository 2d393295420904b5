use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::debug;

use super::{Credentials, Session};

#[derive(Default)]
struct GateState {
    user_id: Option<String>,
    credentials: Option<Credentials>,
}

/// Decides whether a synchronization session should exist at all.
///
/// A session is published iff a valid credential and a resolvable user
/// identity are both present. Absence is the normal logged-out state, never
/// an error.
pub struct SessionGate {
    state: Mutex<GateState>,
    tx: watch::Sender<Option<Session>>,
}

impl SessionGate {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            state: Mutex::new(GateState::default()),
            tx,
        }
    }

    /// Session presence feed for the engine. The receiver sees the current
    /// value immediately and every later transition.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }

    pub fn should_sync(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn login(&self, user_id: impl Into<String>, credentials: Credentials) {
        {
            let mut state = self.state.lock();
            state.user_id = Some(user_id.into());
            state.credentials = Some(credentials);
        }
        self.revalidate();
    }

    pub fn logout(&self) {
        {
            let mut state = self.state.lock();
            state.user_id = None;
            state.credentials = None;
        }
        self.revalidate();
    }

    /// Re-derive the published session. Call on credential expiry events; a
    /// credential that aged out since the last call unpublishes the session.
    pub fn revalidate(&self) {
        let session = self.evaluate(OffsetDateTime::now_utc());
        let changed = self.tx.send_if_modified(|current| {
            if *current == session {
                false
            } else {
                *current = session.clone();
                true
            }
        });
        if changed {
            debug!(
                target: "notify::auth",
                active = session.is_some(),
                "session gate transition"
            );
        }
    }

    fn evaluate(&self, now: OffsetDateTime) -> Option<Session> {
        let state = self.state.lock();
        let user_id = state.user_id.as_ref()?;
        let credentials = state.credentials.as_ref()?;
        if !credentials.is_valid(now) {
            return None;
        }
        Some(Session {
            user_id: user_id.clone(),
            token: credentials.token.clone(),
        })
    }
}

impl Default for SessionGate {
    fn default() -> Self {
        Self::new()
    }
}
