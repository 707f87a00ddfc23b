use chrono::{DateTime, TimeDelta, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::bus::{BusEvent, BusMessage, SessionBus};
use crate::api::IdentityProvider;
use crate::clock::Clock;
use crate::db::LocalCache;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// User interactions that reset the inactivity timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySignal {
    PointerMove,
    PointerDown,
    KeyDown,
    Scroll,
    TouchStart,
    /// The session became visible again after being hidden
    VisibilityRegained,
}

/// Last-interaction tracker
pub struct IdleMonitor {
    clock: Arc<dyn Clock>,
    threshold: TimeDelta,
    last_activity: Mutex<DateTime<Utc>>,
}

impl IdleMonitor {
    pub fn new(clock: Arc<dyn Clock>, threshold: Duration) -> Self {
        let now = clock.now();
        Self {
            clock,
            threshold: TimeDelta::from_std(threshold).unwrap_or(TimeDelta::MAX),
            last_activity: Mutex::new(now),
        }
    }

    pub fn record(&self) {
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner()) = self.clock.now();
    }

    pub fn idle_for(&self) -> TimeDelta {
        let last = *self.last_activity.lock().unwrap_or_else(|e| e.into_inner());
        self.clock.now() - last
    }

    pub fn is_expired(&self) -> bool {
        self.idle_for() >= self.threshold
    }

    pub fn threshold(&self) -> TimeDelta {
        self.threshold
    }
}

/// Ends the session after a period without interaction and mirrors
/// logouts published by other sessions on the same bus. Termination
/// happens at most once.
pub struct IdleTimeout {
    monitor: IdleMonitor,
    identity: Arc<dyn IdentityProvider>,
    cache: Arc<dyn LocalCache>,
    bus: Arc<dyn SessionBus>,
    clock: Arc<dyn Clock>,
    origin: String,
    terminated: watch::Sender<bool>,
}

impl IdleTimeout {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        cache: Arc<dyn LocalCache>,
        bus: Arc<dyn SessionBus>,
        clock: Arc<dyn Clock>,
        threshold: Duration,
    ) -> Self {
        let (terminated, _) = watch::channel(false);
        Self {
            monitor: IdleMonitor::new(Arc::clone(&clock), threshold),
            identity,
            cache,
            bus,
            clock,
            origin: uuid::Uuid::new_v4().to_string(),
            terminated,
        }
    }

    /// Id stamped on messages this session publishes
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn monitor(&self) -> &IdleMonitor {
        &self.monitor
    }

    pub fn is_terminated(&self) -> bool {
        *self.terminated.borrow()
    }

    /// Resolves once the session has been terminated
    pub async fn terminated(&self) {
        let mut rx = self.terminated.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Flips to true when the session ends, by timeout or otherwise
    pub fn subscribe_terminated(&self) -> watch::Receiver<bool> {
        self.terminated.subscribe()
    }

    /// End tracking without signing out or touching the cache, for a
    /// session that already ended elsewhere. Returns false if the
    /// timeout had already terminated.
    pub fn disarm(&self) -> bool {
        !self.terminated.send_replace(true)
    }

    pub async fn activity(&self, signal: ActivitySignal) {
        if self.is_terminated() {
            return;
        }
        // coming back to a hidden session that already timed out ends it
        if signal == ActivitySignal::VisibilityRegained && self.monitor.is_expired() {
            self.terminate(true).await;
            return;
        }
        self.monitor.record();
    }

    /// Terminate if the threshold has elapsed. Returns true when this
    /// call ended the session.
    pub async fn check(&self) -> bool {
        if self.is_terminated() || !self.monitor.is_expired() {
            return false;
        }
        log::info!(
            "Session idle for {} minutes, signing out",
            self.monitor.idle_for().num_minutes()
        );
        self.terminate(true).await
    }

    pub async fn on_bus_message(&self, message: &BusMessage) -> bool {
        if message.origin == self.origin {
            return false;
        }
        match message.kind {
            BusEvent::Logout => {
                log::info!("Logout received from session {}", message.origin);
                self.terminate(false).await
            }
        }
    }

    /// Sign out, clear the local cache and optionally tell the other
    /// sessions. Returns false if the session was already terminated.
    pub async fn terminate(&self, broadcast: bool) -> bool {
        if self.terminated.send_replace(true) {
            return false;
        }

        if let Err(e) = self.identity.sign_out().await {
            log::warn!("Sign-out failed during session termination: {}", e);
        }
        if let Err(e) = self.cache.clear() {
            log::warn!("Failed to clear journal cache: {}", e);
        }
        if broadcast {
            if let Err(e) = self.bus.publish(BusMessage::logout(&self.origin, self.clock.now())) {
                log::warn!("Failed to broadcast logout: {}", e);
            }
        }

        log::info!("Session {} terminated", self.origin);
        true
    }

    /// Run the periodic check and the bus listener until the session ends
    pub fn spawn(self: Arc<Self>, check_interval: Duration) -> IdleTimeoutHandle {
        let mut messages = self.bus.subscribe();

        let ticker = {
            let timeout = Arc::clone(&self);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(check_interval);
                interval.tick().await;
                loop {
                    interval.tick().await;
                    if timeout.is_terminated() || timeout.check().await {
                        break;
                    }
                }
            })
        };

        let listener = {
            let timeout = Arc::clone(&self);
            tokio::spawn(async move {
                loop {
                    match messages.recv().await {
                        Ok(message) => {
                            timeout.on_bus_message(&message).await;
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            log::warn!("Session bus lagged, {} messages skipped", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                    if timeout.is_terminated() {
                        break;
                    }
                }
            })
        };

        IdleTimeoutHandle {
            timeout: self,
            ticker,
            listener,
        }
    }
}

/// Background tasks of a running idle timeout; dropping stops them
pub struct IdleTimeoutHandle {
    timeout: Arc<IdleTimeout>,
    ticker: JoinHandle<()>,
    listener: JoinHandle<()>,
}

impl IdleTimeoutHandle {
    pub fn timeout(&self) -> &IdleTimeout {
        &self.timeout
    }

    pub fn stop(&self) {
        self.ticker.abort();
        self.listener.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.ticker.is_finished() && self.listener.is_finished()
    }
}

impl Drop for IdleTimeoutHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
