//! Email/password sign-in against the backend's token endpoint

use super::{AuthError, AuthProvider, AuthSession, SessionFile};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::{Mutex, PoisonError};
use url::Url;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self, now: DateTime<Utc>) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| self.expires_in.map(|secs| now + Duration::seconds(secs)));
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user_id: self.user.id,
            email: self.user.email,
            expires_at,
        }
    }
}

/// Password grant auth with an optional on-disk session cache
pub struct PasswordAuth {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    file: Option<SessionFile>,
    session: Mutex<Option<AuthSession>>,
}

impl PasswordAuth {
    pub fn new(base_url: &str, api_key: &str, request_timeout: std::time::Duration) -> anyhow::Result<Self> {
        use anyhow::Context;

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let mut base_url = Url::parse(base_url).context("Invalid backend URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http,
            base_url,
            api_key: api_key.to_string(),
            file: None,
            session: Mutex::new(None),
        })
    }

    /// Persist sessions to `file` and pick up a previously saved one
    pub fn with_session_file(mut self, file: SessionFile) -> Self {
        *self.session.get_mut().unwrap_or_else(PoisonError::into_inner) = file.load();
        self.file = Some(file);
        self
    }

    fn cached(&self) -> Option<AuthSession> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store(&self, session: Option<AuthSession>) -> Result<(), AuthError> {
        if let Some(file) = &self.file {
            match &session {
                Some(s) => file.save(s)?,
                None => file.clear()?,
            }
        }
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = session;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base_url
            .join(path)
            .map_err(|e| AuthError::Decode(format!("invalid auth url: {}", e)))
    }

    async fn token_request(&self, grant_type: &str, body: Value) -> Result<AuthSession, AuthError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let resp = self
            .http
            .post(url)
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = error_message(resp.text().await.unwrap_or_default());
            return Err(match status.as_u16() {
                400 | 401 | 422 => AuthError::InvalidCredentials(message),
                code => AuthError::Status {
                    status: code,
                    message,
                },
            });
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Decode(e.to_string()))?;
        Ok(token.into_session(Utc::now()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        tracing::debug!("Refreshing expired session");
        self.token_request("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }
}

/// Pull the human-readable message out of an auth error body
fn error_message(body: String) -> String {
    serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|key| v.get(key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or(body)
}

#[async_trait]
impl AuthProvider for PasswordAuth {
    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        let Some(session) = self.cached() else {
            return Ok(None);
        };
        if !session.is_expired(Utc::now()) {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            tracing::info!("Session expired");
            self.store(None)?;
            return Ok(None);
        };
        match self.refresh(refresh_token).await {
            Ok(fresh) => {
                self.store(Some(fresh.clone()))?;
                Ok(Some(fresh))
            }
            Err(AuthError::InvalidCredentials(reason)) => {
                tracing::info!(%reason, "Session refresh rejected");
                self.store(None)?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let session = self
            .token_request("password", json!({ "email": email, "password": password }))
            .await?;
        tracing::info!(user_id = %session.user_id, "Signed in");
        self.store(Some(session.clone()))?;
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(session) = self.cached() {
            let url = self.endpoint("auth/v1/logout")?;
            let result = self
                .http
                .post(url)
                .header("apikey", &self.api_key)
                .bearer_auth(&session.access_token)
                .send()
                .await;
            // The local session goes away even if the server could not be told
            if let Err(e) = result {
                tracing::warn!(error = %e, "Remote sign-out failed");
            }
        }
        self.store(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CannedServer, Reply};
    use tempfile::TempDir;

    const TOKEN_BODY: &str = r#"{"access_token":"tok-1","refresh_token":"ref-1","expires_in":3600,"user":{"id":"user-1","email":"ops@example.com"}}"#;

    fn auth(server: &CannedServer) -> PasswordAuth {
        PasswordAuth::new(&server.url, "anon", std::time::Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_sign_in_persists_session() {
        let server = CannedServer::start(vec![Reply::Respond(200, TOKEN_BODY.into())]).await;
        let dir = TempDir::new().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        let auth = auth(&server).with_session_file(file.clone());

        let session = auth.sign_in("ops@example.com", "pw").await.unwrap();
        assert_eq!(session.user_id, "user-1");
        assert!(session.expires_at.is_some());
        assert_eq!(file.load().unwrap().access_token, "tok-1");

        let request = &server.requests()[0];
        assert!(request.starts_with("POST /auth/v1/token?grant_type=password"));
        assert!(request.contains("apikey: anon"));
    }

    #[tokio::test]
    async fn test_bad_password_is_invalid_credentials() {
        let server = CannedServer::start(vec![Reply::Respond(
            400,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#.into(),
        )])
        .await;
        let err = auth(&server).sign_in("a@b.c", "nope").await.unwrap_err();
        match err {
            AuthError::InvalidCredentials(msg) => assert_eq!(msg, "Invalid login credentials"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_expired_session_is_refreshed() {
        let server = CannedServer::start(vec![Reply::Respond(200, TOKEN_BODY.into())]).await;
        let dir = TempDir::new().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        file.save(&AuthSession {
            access_token: "old".into(),
            refresh_token: Some("ref-0".into()),
            user_id: "user-1".into(),
            email: None,
            expires_at: Some(Utc::now() - Duration::minutes(5)),
        })
        .unwrap();

        let auth = auth(&server).with_session_file(file);
        let session = auth.current_session().await.unwrap().unwrap();
        assert_eq!(session.access_token, "tok-1");
        assert!(server.requests()[0].contains("grant_type=refresh_token"));
    }

    #[tokio::test]
    async fn test_sign_out_clears_even_when_remote_fails() {
        let server = CannedServer::start(vec![
            Reply::Respond(200, TOKEN_BODY.into()),
            Reply::Drop,
        ])
        .await;
        let auth = auth(&server);
        auth.sign_in("ops@example.com", "pw").await.unwrap();
        auth.sign_out().await.unwrap();
        assert!(auth.current_session().await.unwrap().is_none());
    }
}
