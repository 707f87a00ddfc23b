use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

use super::client::{AuthEvent, IdentityProvider, RemoteStore, Session, SettingsRow, WeekRow};
use super::error::ApiError;

/// Backend held entirely in process memory. Accepts any password, keeps
/// one session, and can be switched into a failing mode.
pub struct InMemoryBackend {
    session: Mutex<Option<Session>>,
    settings: Mutex<BTreeMap<String, SettingsRow>>,
    weeks: Mutex<BTreeMap<(String, chrono::NaiveDate), WeekRow>>,
    events: broadcast::Sender<AuthEvent>,
    failing: AtomicBool,
    writes: AtomicUsize,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            session: Mutex::new(None),
            settings: Mutex::new(BTreeMap::new()),
            weeks: Mutex::new(BTreeMap::new()),
            events,
            failing: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that already has `user_id` signed in
    pub fn signed_in(user_id: &str) -> Self {
        let backend = Self::default();
        *backend.session.lock().unwrap_or_else(|e| e.into_inner()) = Some(Self::session_for(user_id, None));
        backend
    }

    fn session_for(user_id: &str, email: Option<&str>) -> Session {
        Session {
            user_id: user_id.to_string(),
            email: email.map(str::to_string),
            access_token: format!("local-{}", uuid::Uuid::new_v4()),
            expires_at: None,
        }
    }

    /// Every call fails with a network error while set
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful upserts so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn week(&self, user_id: &str, week_start: chrono::NaiveDate) -> Option<WeekRow> {
        self.weeks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(user_id.to_string(), week_start))
            .cloned()
    }

    pub fn settings(&self, user_id: &str) -> Option<SettingsRow> {
        self.settings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(user_id)
            .cloned()
    }

    /// Session ended by the backend itself (expiry, revocation)
    pub fn expire_session(&self) {
        let previous = self.session.lock().unwrap_or_else(|e| e.into_inner()).take();
        if previous.is_some() {
            let _ = self.events.send(AuthEvent::SignedOut);
        }
    }

    fn check_available(&self) -> Result<(), ApiError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ApiError::NetworkError("backend unavailable".to_string()));
        }
        Ok(())
    }

    fn start_session(&self, session: Session) {
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = Some(session.clone());
        let _ = self.events.send(AuthEvent::SignedIn(session));
    }
}

#[async_trait]
impl IdentityProvider for InMemoryBackend {
    async fn current_session(&self) -> Result<Option<Session>, ApiError> {
        self.check_available()?;
        Ok(self.session.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, ApiError> {
        let session = self.sign_in(email, password).await?;
        Ok(Some(session))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        self.check_available()?;
        if password.is_empty() {
            return Err(ApiError::AuthenticationError("Password required".to_string()));
        }
        let session = Self::session_for(&format!("user-{}", email), Some(email));
        self.start_session(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), ApiError> {
        self.expire_session();
        self.check_available()
    }

    async fn send_password_reset(&self, _email: &str) -> Result<(), ApiError> {
        self.check_available()
    }
}

#[async_trait]
impl RemoteStore for InMemoryBackend {
    async fn fetch_settings(&self, user_id: &str) -> Result<Option<SettingsRow>, ApiError> {
        self.check_available()?;
        Ok(self.settings(user_id))
    }

    async fn fetch_weeks(&self, user_id: &str) -> Result<Vec<WeekRow>, ApiError> {
        self.check_available()?;
        let weeks = self.weeks.lock().unwrap_or_else(|e| e.into_inner());
        Ok(weeks
            .values()
            .rev()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert_settings(&self, row: &SettingsRow) -> Result<(), ApiError> {
        self.check_available()?;
        self.settings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(row.user_id.clone(), row.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn upsert_week(&self, row: &WeekRow) -> Result<(), ApiError> {
        self.check_available()?;
        self.weeks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((row.user_id.clone(), row.week_start), row.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JournalEntry;
    use chrono::{NaiveDate, Utc};

    fn row(user: &str, day: u32) -> WeekRow {
        let start = NaiveDate::from_ymd_opt(2026, 10, day).unwrap();
        WeekRow {
            user_id: user.to_string(),
            week_start: start,
            week_end: start,
            payload: JournalEntry::default(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_weeks_come_back_newest_first_per_user() {
        let backend = InMemoryBackend::signed_in("user-1");
        backend.upsert_week(&row("user-1", 5)).await.unwrap();
        backend.upsert_week(&row("user-1", 12)).await.unwrap();
        backend.upsert_week(&row("user-2", 19)).await.unwrap();

        let weeks = backend.fetch_weeks("user-1").await.unwrap();
        let starts: Vec<u32> = weeks.iter().map(|w| chrono::Datelike::day(&w.week_start)).collect();
        assert_eq!(starts, vec![12, 5]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_week() {
        let backend = InMemoryBackend::signed_in("user-1");
        backend.upsert_week(&row("user-1", 12)).await.unwrap();
        backend.upsert_week(&row("user-1", 12)).await.unwrap();

        assert_eq!(backend.fetch_weeks("user-1").await.unwrap().len(), 1);
        assert_eq!(backend.write_count(), 2);
    }

    #[tokio::test]
    async fn test_failing_mode_returns_network_errors() {
        let backend = InMemoryBackend::signed_in("user-1");
        backend.set_failing(true);
        assert!(matches!(
            backend.fetch_settings("user-1").await,
            Err(ApiError::NetworkError(_))
        ));
    }
}
