use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::db::Database;
use crate::error::{JournalError, Result};

/// Key shared by every session of the same cache file
pub const SESSION_EVENT_KEY: &str = "weekly-journal:session-event";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BusEvent {
    Logout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusMessage {
    pub kind: BusEvent,
    /// Session that published the message
    pub origin: String,
    pub sent_at: DateTime<Utc>,
}

impl BusMessage {
    pub fn logout(origin: &str, sent_at: DateTime<Utc>) -> Self {
        Self {
            kind: BusEvent::Logout,
            origin: origin.to_string(),
            sent_at,
        }
    }
}

/// Same-origin event bus between sessions
pub trait SessionBus: Send + Sync {
    fn publish(&self, message: BusMessage) -> Result<()>;
    fn subscribe(&self) -> broadcast::Receiver<BusMessage>;
}

/// In-process bus; clones share one channel
#[derive(Clone)]
pub struct ChannelBus {
    sender: broadcast::Sender<BusMessage>,
}

impl ChannelBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self { sender }
    }
}

impl Default for ChannelBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBus for ChannelBus {
    fn publish(&self, message: BusMessage) -> Result<()> {
        // no subscribers is not an error
        let _ = self.sender.send(message);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }
}

/// Bus over a key of the shared cache database, for sessions in separate
/// processes. A poller forwards every new value of the key to local
/// subscribers; values this instance wrote itself are not echoed back.
pub struct StorageBus {
    db: Arc<Database>,
    sender: broadcast::Sender<BusMessage>,
    last_seen: Arc<Mutex<Option<String>>>,
    poller: JoinHandle<()>,
}

impl StorageBus {
    /// Must be called inside a tokio runtime
    pub fn new(db: Arc<Database>, poll_interval: Duration) -> Result<Self> {
        let (sender, _) = broadcast::channel(16);
        let last_seen = Arc::new(Mutex::new(db.get(SESSION_EVENT_KEY)?));

        let poller = tokio::spawn(Self::poll(
            Arc::clone(&db),
            sender.clone(),
            Arc::clone(&last_seen),
            poll_interval,
        ));

        Ok(Self {
            db,
            sender,
            last_seen,
            poller,
        })
    }

    async fn poll(
        db: Arc<Database>,
        sender: broadcast::Sender<BusMessage>,
        last_seen: Arc<Mutex<Option<String>>>,
        poll_interval: Duration,
    ) {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            ticker.tick().await;

            let raw = match db.get(SESSION_EVENT_KEY) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("Failed to read session event: {}", e);
                    continue;
                }
            };

            {
                let mut seen = last_seen.lock().unwrap_or_else(|e| e.into_inner());
                if seen.as_deref() == Some(raw.as_str()) {
                    continue;
                }
                *seen = Some(raw.clone());
            }

            match serde_json::from_str::<BusMessage>(&raw) {
                Ok(message) => {
                    let _ = sender.send(message);
                }
                Err(e) => log::warn!("Ignoring malformed session event: {}", e),
            }
        }
    }
}

impl SessionBus for StorageBus {
    fn publish(&self, message: BusMessage) -> Result<()> {
        let raw = serde_json::to_string(&message)
            .map_err(|e| JournalError::CacheError(format!("Failed to serialize session event: {}", e)))?;
        *self.last_seen.lock().unwrap_or_else(|e| e.into_inner()) = Some(raw.clone());
        self.db.set(SESSION_EVENT_KEY, &raw)?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }
}

impl Drop for StorageBus {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(origin: &str) -> BusMessage {
        BusMessage::logout(origin, Utc.with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap())
    }

    #[test]
    fn test_message_wire_format() {
        let json = serde_json::to_value(message("tab-1")).unwrap();
        assert_eq!(json["kind"], "logout");
        assert_eq!(json["origin"], "tab-1");
        assert_eq!(json["sentAt"], "2026-10-14T09:00:00Z");
    }

    #[tokio::test]
    async fn test_channel_bus_clones_share_channel() {
        let bus = ChannelBus::new();
        let other = bus.clone();
        let mut rx = other.subscribe();

        bus.publish(message("tab-1")).unwrap();
        assert_eq!(rx.recv().await.unwrap().origin, "tab-1");
    }

    #[test]
    fn test_channel_bus_publish_without_subscribers() {
        assert!(ChannelBus::new().publish(message("tab-1")).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_bus_delivers_across_instances() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let first = StorageBus::new(db.clone(), Duration::from_millis(500)).unwrap();
        let second = StorageBus::new(db.clone(), Duration::from_millis(500)).unwrap();
        let mut first_rx = first.subscribe();
        let mut second_rx = second.subscribe();

        first.publish(message("tab-1")).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(second_rx.try_recv().unwrap().origin, "tab-1");
        // the writer does not hear its own event
        assert!(first_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_storage_bus_skips_event_present_at_startup() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.set(SESSION_EVENT_KEY, &serde_json::to_string(&message("old")).unwrap())
            .unwrap();

        let bus = StorageBus::new(db, Duration::from_millis(500)).unwrap();
        let mut rx = bus.subscribe();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(rx.try_recv().is_err());
    }
}
