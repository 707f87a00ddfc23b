use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use std::sync::RwLock;
use tokio::sync::broadcast;

use crate::api::{
    client::{AuthEvent, IdentityProvider, RemoteStore, Session, SettingsRow, WeekRow},
    error::ApiError,
};

use super::types::{AuthUser, ErrorBody, PasswordCredentials, RecoverRequest, SignUpResponse, TokenResponse};

const AUTH_PATH: &str = "/auth/v1";
const REST_PATH: &str = "/rest/v1";
const SETTINGS_TABLE: &str = "journal_settings";
const WEEKS_TABLE: &str = "journal_weeks";
const UPSERT_PREFERENCE: &str = "resolution=merge-duplicates,return=minimal";

/// Client for a hosted Postgres backend: `/auth/v1` for identity,
/// `/rest/v1` for the journal tables
pub struct SupabaseClient {
    base_url: String,
    anon_key: String,
    http_client: reqwest::Client,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

impl SupabaseClient {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            http_client: reqwest::Client::new(),
            session: RwLock::new(None),
            events,
        }
    }

    /// Start from a previously stored session
    pub fn with_session(self, session: Session) -> Self {
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = Some(session);
        self
    }

    pub fn session(&self) -> Option<Session> {
        self.session.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_session(&self, session: Option<Session>) {
        let previous = {
            let mut slot = self.session.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *slot, session.clone())
        };

        let event = match (previous, session) {
            (_, Some(session)) => AuthEvent::SignedIn(session),
            (Some(_), None) => AuthEvent::SignedOut,
            (None, None) => return,
        };
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `apikey` plus a bearer token: the user's when signed in, else the anon key
    fn build_headers(&self) -> Result<HeaderMap, ApiError> {
        let token = self
            .session()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.anon_key.clone());

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.anon_key)
                .map_err(|e| ApiError::AuthenticationError(format!("Invalid anon key: {}", e)))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::AuthenticationError(format!("Invalid access token: {}", e)))?,
        );
        Ok(headers)
    }

    fn require_session(&self) -> Result<Session, ApiError> {
        self.session().ok_or(ApiError::NotSignedIn)
    }

    async fn check_status(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = parsed.message().unwrap_or_else(|| body.clone());

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::AuthenticationError(message));
        }

        Err(ApiError::BackendError {
            code: parsed.code().unwrap_or_else(|| status.as_u16().to_string()),
            message,
        })
    }

    fn session_from_token(token: TokenResponse) -> Session {
        let expires_at = token.expires_at.or_else(|| {
            token
                .expires_in
                .map(|secs| chrono::Utc::now().timestamp() + secs)
        });

        Session {
            user_id: token.user.id,
            email: token.user.email,
            access_token: token.access_token,
            expires_at,
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn current_session(&self) -> Result<Option<Session>, ApiError> {
        let Some(session) = self.session() else {
            return Ok(None);
        };

        let response = self
            .http_client
            .get(self.url(&format!("{}/user", AUTH_PATH)))
            .headers(self.build_headers()?)
            .send()
            .await?;

        match Self::check_status(response).await {
            Ok(response) => {
                let user: AuthUser = response.json().await?;
                let refreshed = Session {
                    user_id: user.id,
                    email: user.email,
                    ..session
                };
                *self.session.write().unwrap_or_else(|e| e.into_inner()) = Some(refreshed.clone());
                Ok(Some(refreshed))
            }
            Err(ApiError::AuthenticationError(reason)) => {
                log::info!("Stored session rejected: {}", reason);
                self.set_session(None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>, ApiError> {
        let response = self
            .http_client
            .post(self.url(&format!("{}/signup", AUTH_PATH)))
            .headers(self.build_headers()?)
            .json(&PasswordCredentials { email, password })
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        match response.json::<SignUpResponse>().await? {
            SignUpResponse::Session(token) => {
                let session = Self::session_from_token(token);
                self.set_session(Some(session.clone()));
                Ok(Some(session))
            }
            SignUpResponse::User(user) => {
                log::info!("Sign-up for {} awaits email confirmation", user.id);
                Ok(None)
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let response = self
            .http_client
            .post(self.url(&format!("{}/token", AUTH_PATH)))
            .query(&[("grant_type", "password")])
            .headers(self.build_headers()?)
            .json(&PasswordCredentials { email, password })
            .send()
            .await?;

        let token: TokenResponse = Self::check_status(response).await?.json().await?;
        let session = Self::session_from_token(token);
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), ApiError> {
        if self.session().is_none() {
            return Ok(());
        }

        let result = self
            .http_client
            .post(self.url(&format!("{}/logout", AUTH_PATH)))
            .headers(self.build_headers()?)
            .send()
            .await;

        // The local session ends even when the backend call fails
        self.set_session(None);

        Self::check_status(result?).await?;
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), ApiError> {
        let response = self
            .http_client
            .post(self.url(&format!("{}/recover", AUTH_PATH)))
            .headers(self.build_headers()?)
            .json(&RecoverRequest { email })
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for SupabaseClient {
    async fn fetch_settings(&self, user_id: &str) -> Result<Option<SettingsRow>, ApiError> {
        self.require_session()?;

        let response = self
            .http_client
            .get(self.url(&format!("{}/{}", REST_PATH, SETTINGS_TABLE)))
            .query(&[("user_id", format!("eq.{}", user_id)), ("select", "*".to_string())])
            .headers(self.build_headers()?)
            .send()
            .await?;

        let text = Self::check_status(response).await?.text().await?;
        let rows: Vec<SettingsRow> = serde_json::from_str(&text)
            .map_err(|e| ApiError::ParseError(format!("Failed to parse settings: {} - Body: {}", e, text)))?;

        Ok(rows.into_iter().next())
    }

    async fn fetch_weeks(&self, user_id: &str) -> Result<Vec<WeekRow>, ApiError> {
        self.require_session()?;

        let response = self
            .http_client
            .get(self.url(&format!("{}/{}", REST_PATH, WEEKS_TABLE)))
            .query(&[
                ("user_id", format!("eq.{}", user_id)),
                ("select", "*".to_string()),
                ("order", "week_start.desc".to_string()),
            ])
            .headers(self.build_headers()?)
            .send()
            .await?;

        let text = Self::check_status(response).await?.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::ParseError(format!("Failed to parse weeks: {} - Body: {}", e, text)))
    }

    async fn upsert_settings(&self, row: &SettingsRow) -> Result<(), ApiError> {
        self.require_session()?;

        let response = self
            .http_client
            .post(self.url(&format!("{}/{}", REST_PATH, SETTINGS_TABLE)))
            .query(&[("on_conflict", "user_id")])
            .headers(self.build_headers()?)
            .header("Prefer", UPSERT_PREFERENCE)
            .json(row)
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn upsert_week(&self, row: &WeekRow) -> Result<(), ApiError> {
        self.require_session()?;

        let response = self
            .http_client
            .post(self.url(&format!("{}/{}", REST_PATH, WEEKS_TABLE)))
            .query(&[("on_conflict", "user_id,week_start")])
            .headers(self.build_headers()?)
            .header("Prefer", UPSERT_PREFERENCE)
            .json(row)
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }
}
