use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::idle::{IdleTimeout, IdleTimeoutHandle};
use crate::api::{AuthEvent, IdentityProvider, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Identity check still running
    Unresolved,
    /// Sign-in required
    NoSession,
    HasSession(Session),
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::HasSession(session) => Some(session),
            _ => None,
        }
    }
}

/// Resolves the signed-in identity once on mount and follows session
/// changes until unmounted
pub struct SessionGate {
    identity: Arc<dyn IdentityProvider>,
    state: Arc<watch::Sender<SessionState>>,
    mounted: Arc<AtomicBool>,
    listener: Option<JoinHandle<()>>,
    /// Armed while a session is held; cleared on sign-out
    idle: Arc<Mutex<Option<IdleTimeoutHandle>>>,
}

impl SessionGate {
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        let (state, _) = watch::channel(SessionState::Unresolved);
        Self {
            identity,
            state: Arc::new(state),
            mounted: Arc::new(AtomicBool::new(false)),
            listener: None,
            idle: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn mount(&mut self) -> SessionState {
        if self.listener.is_some() {
            return self.state();
        }
        self.mounted.store(true, Ordering::SeqCst);

        // subscribe before resolving so no change is missed in between
        let events = self.identity.subscribe();
        self.listener = Some(tokio::spawn(Self::follow(
            events,
            Arc::clone(&self.state),
            Arc::clone(&self.mounted),
            Arc::clone(&self.idle),
        )));

        let resolved = match self.identity.current_session().await {
            Ok(Some(session)) => SessionState::HasSession(session),
            Ok(None) => SessionState::NoSession,
            Err(e) => {
                log::warn!("Identity check failed, sign-in required: {}", e);
                SessionState::NoSession
            }
        };

        if self.mounted.load(Ordering::SeqCst) {
            // a change notification that arrived first wins
            self.state.send_if_modified(|state| {
                if *state == SessionState::Unresolved {
                    *state = resolved;
                    true
                } else {
                    false
                }
            });
        }

        let state = self.state();
        log::info!(
            "Session gate mounted: {}",
            state.session().map_or("no session", |s| s.user_id.as_str())
        );
        state
    }

    async fn follow(
        mut events: broadcast::Receiver<AuthEvent>,
        state: Arc<watch::Sender<SessionState>>,
        mounted: Arc<AtomicBool>,
        idle: Arc<Mutex<Option<IdleTimeoutHandle>>>,
    ) {
        loop {
            let next = match events.recv().await {
                Ok(AuthEvent::SignedIn(session)) => SessionState::HasSession(session),
                Ok(AuthEvent::SignedOut) => SessionState::NoSession,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if !mounted.load(Ordering::SeqCst) {
                break;
            }
            log::debug!("Session changed: {:?}", next.session().map(|s| &s.user_id));
            if next == SessionState::NoSession {
                Self::disarm_idle(&idle);
            }
            state.send_replace(next);
        }
    }

    /// Stop the idle timer of a session that ended. A timer that is
    /// itself terminating keeps running until it has finished.
    fn disarm_idle(idle: &Mutex<Option<IdleTimeoutHandle>>) {
        let mut slot = idle.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|handle| handle.timeout().disarm()) {
            log::debug!("Idle timeout disarmed after sign-out");
            *slot = None;
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Start the inactivity timeout for the current session. Ignored when
    /// nobody is signed in.
    pub fn arm_idle_timeout(&mut self, timeout: Arc<IdleTimeout>, check_interval: Duration) -> bool {
        if self.session().is_none() {
            return false;
        }
        let handle = timeout.spawn(check_interval);
        *self.idle.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        true
    }

    /// Stop following session changes; the state stays frozen afterwards
    pub fn unmount(&mut self) {
        self.mounted.store(false, Ordering::SeqCst);
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        *self.idle.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl Drop for SessionGate {
    fn drop(&mut self) {
        self.unmount();
    }
}
