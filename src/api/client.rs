use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::error::ApiError;
use crate::models::{CustomCheck, JournalEntry};

/// Authenticated identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    pub access_token: String,
    /// Unix seconds
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
}

/// `journal_settings` row: one per user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsRow {
    pub user_id: String,
    #[serde(default)]
    pub custom_checks: Vec<CustomCheck>,
    pub updated_at: DateTime<Utc>,
}

/// `journal_weeks` row: one per user and week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekRow {
    pub user_id: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub payload: JournalEntry,
    pub updated_at: DateTime<Utc>,
}

/// Identity and session provider of the hosted backend
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Currently signed-in user, if the stored session is still valid
    async fn current_session(&self) -> Result<Option<Session>, ApiError>;

    /// Session change notifications
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    /// Returns a session when the backend signs the user in immediately,
    /// `None` when email confirmation is pending
    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, ApiError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ApiError>;

    async fn sign_out(&self) -> Result<(), ApiError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), ApiError>;
}

/// Per-user tables of the hosted backend
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_settings(&self, user_id: &str) -> Result<Option<SettingsRow>, ApiError>;

    /// All weeks of a user, newest `week_start` first
    async fn fetch_weeks(&self, user_id: &str) -> Result<Vec<WeekRow>, ApiError>;

    /// Upsert keyed by `user_id`
    async fn upsert_settings(&self, row: &SettingsRow) -> Result<(), ApiError>;

    /// Upsert keyed by `(user_id, week_start)`
    async fn upsert_week(&self, row: &WeekRow) -> Result<(), ApiError>;
}
