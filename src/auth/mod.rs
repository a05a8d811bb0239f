//! Authentication
//!
//! The synchronizer only needs to know who is signed in and with which
//! token. `AuthProvider` is the seam; `PasswordAuth` talks to the backend's
//! token endpoint and `StaticAuth` wraps a token supplied by configuration.

mod password;
mod session_file;

pub use password::PasswordAuth;
pub use session_file::SessionFile;

use crate::config::{Config, paths};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A signed-in user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("auth endpoint returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected auth response: {0}")]
    Decode(String),

    #[error("session file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of the current session
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Session currently in effect, `None` when signed out or expired
    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Session from a pre-issued token; cannot sign in with a password
pub struct StaticAuth {
    session: std::sync::Mutex<Option<AuthSession>>,
}

impl StaticAuth {
    pub fn new(access_token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            session: std::sync::Mutex::new(Some(AuthSession {
                access_token: access_token.into(),
                refresh_token: None,
                user_id: user_id.into(),
                email: None,
                expires_at: None,
            })),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        Ok(self
            .session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone())
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> Result<AuthSession, AuthError> {
        Err(AuthError::InvalidCredentials(
            "a static access token is configured; unset KODO_ACCESS_TOKEN to sign in".to_string(),
        ))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        *self
            .session
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Auth provider for a configuration
///
/// A configured access token and user id win; otherwise password sign-in
/// with the session cached in the state directory.
pub fn provider_for(config: &Config) -> anyhow::Result<Box<dyn AuthProvider>> {
    if let (Some(token), Some(user_id)) = (&config.auth.access_token, &config.auth.user_id) {
        tracing::debug!("Using static access token");
        return Ok(Box::new(StaticAuth::new(token.clone(), user_id.clone())));
    }
    if !config.has_backend() {
        anyhow::bail!(
            "No backend configured; set backend.url and backend.anonKey (or KODO_BACKEND_URL / KODO_ANON_KEY)"
        );
    }
    let auth = PasswordAuth::new(
        &config.backend.url,
        &config.backend.anon_key,
        config.request_timeout(),
    )?
    .with_session_file(SessionFile::new(paths::session_path()));
    Ok(Box::new(auth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_static_auth_session_and_sign_out() {
        let auth = StaticAuth::new("tok", "user-1");
        let session = auth.current_session().await.unwrap().unwrap();
        assert_eq!(session.user_id, "user-1");
        assert!(auth.sign_in("a@b.c", "pw").await.is_err());

        auth.sign_out().await.unwrap();
        assert!(auth.current_session().await.unwrap().is_none());
    }

    #[test]
    fn test_provider_requires_backend_without_token() {
        assert!(provider_for(&Config::default()).is_err());

        let mut config = Config::default();
        config.auth.access_token = Some("tok".into());
        config.auth.user_id = Some("u1".into());
        assert!(provider_for(&config).is_ok());
    }

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let mut session = AuthSession {
            access_token: "t".into(),
            refresh_token: None,
            user_id: "u".into(),
            email: None,
            expires_at: None,
        };
        assert!(!session.is_expired(now));
        session.expires_at = Some(now - Duration::seconds(1));
        assert!(session.is_expired(now));
    }
}
