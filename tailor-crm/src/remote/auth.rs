//! Password authentication against the hosted auth API
//!
//! The current session is published on a `watch` channel; the table and
//! storage clients read their bearer token from it, and anything else that
//! cares about sign-in state can subscribe. Sessions survive restarts as
//! `session.json` in the data directory.

use super::{check_response, normalize_base_url};
use crate::config::RemoteSettings;
use crate::error::{AppError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: Option<String>,
}

/// Signed-in session, in the shape the token endpoint returns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix seconds
    pub expires_at: Option<i64>,
    pub user: SessionUser,
}

pub struct AuthClient {
    client: Client,
    base_url: String,
    anon_key: String,
    session_path: PathBuf,
    tx: watch::Sender<Option<Session>>,
}

impl AuthClient {
    pub fn new(settings: &RemoteSettings, session_path: PathBuf) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            client: Client::new(),
            base_url: normalize_base_url(&settings.url),
            anon_key: settings.anon_key.clone(),
            session_path,
            tx,
        }
    }

    /// Restore a persisted session, if any
    pub async fn load(&self) -> Result<Option<Session>> {
        if !self.session_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.session_path).await?;
        let session = match serde_json::from_str::<Session>(&content) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!("Ignoring unreadable session file {:?}: {}", self.session_path, e);
                None
            }
        };

        if let Some(session) = &session {
            tracing::info!("Restored session for user {}", session.user.id);
        }
        self.tx.send_replace(session.clone());
        Ok(session)
    }

    pub fn session(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn require_session(&self) -> Result<Session> {
        self.session().ok_or(AppError::SessionRequired)
    }

    /// Receiver that changes whenever the user signs in or out
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let body = credentials(email, password)?;
        tracing::info!("Signing in as {}", email.trim());

        let response = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;
        let session: Session = check_response(response).await?.json().await?;

        self.store(Some(session.clone())).await?;
        Ok(session)
    }

    /// Register a new user. Returns `None` when the backend wants the email
    /// address confirmed before a session is issued.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>> {
        let body = credentials(email, password)?;
        tracing::info!("Signing up {}", email.trim());

        let response = self
            .client
            .post(format!("{}/auth/v1/signup", self.base_url))
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;
        let value: serde_json::Value = check_response(response).await?.json().await?;

        let session = session_from_signup(value)?;
        match &session {
            Some(_) => self.store(session.clone()).await?,
            None => tracing::info!("Sign-up pending email confirmation"),
        }
        Ok(session)
    }

    /// End the session. The local session is cleared even if the backend
    /// cannot be reached.
    pub async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.session() else {
            return Ok(());
        };
        tracing::info!("Signing out user {}", session.user.id);

        let result = self
            .client
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await;

        match result {
            Ok(response) => {
                if let Err(e) = check_response(response).await {
                    tracing::warn!("Remote sign-out failed: {}", e);
                }
            }
            Err(e) => tracing::warn!("Remote sign-out failed: {}", e),
        }

        self.store(None).await
    }

    async fn store(&self, session: Option<Session>) -> Result<()> {
        match &session {
            Some(session) => {
                if let Some(parent) = self.session_path.parent() {
                    fs::create_dir_all(parent).await?;
                }
                let content = serde_json::to_string_pretty(session)?;
                fs::write(&self.session_path, content).await?;
            }
            None => {
                if self.session_path.exists() {
                    fs::remove_file(&self.session_path).await?;
                }
            }
        }

        self.tx.send_replace(session);
        Ok(())
    }
}

fn credentials(email: &str, password: &str) -> Result<serde_json::Value> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("A valid email address is required".to_string()));
    }
    if password.is_empty() {
        return Err(AppError::Validation("A password is required".to_string()));
    }
    Ok(json!({ "email": email, "password": password }))
}

/// The sign-up endpoint answers with a session when confirmation is off,
/// and with just the user otherwise.
fn session_from_signup(value: serde_json::Value) -> Result<Option<Session>> {
    if value.get("access_token").is_some_and(|t| !t.is_null()) {
        Ok(Some(serde_json::from_value(value)?))
    } else {
        Ok(None)
    }
}
