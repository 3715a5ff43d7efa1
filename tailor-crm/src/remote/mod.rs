//! Remote backend
//!
//! Talks to the hosted backend over HTTPS:
//! - PostgREST-style table API ([`RestClient`], a [`crate::database::DataStore`])
//! - Storage bucket API ([`RemoteStorage`], a [`crate::storage::ObjectStore`])
//! - Password auth API ([`AuthClient`])
//!
//! Every request carries the project's anon key as `apikey` and is
//! authorized with the signed-in user's access token, or the anon key when
//! nobody is signed in.

pub mod auth;
pub mod rest;
pub mod storage;

pub use auth::{AuthClient, Session, SessionUser};
pub use rest::RestClient;
pub use storage::RemoteStorage;

use crate::config::RemoteSettings;
use crate::error::{AppError, Result};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use tokio::sync::watch;

/// Shared HTTP plumbing for the table and storage clients
#[derive(Clone)]
pub struct RemoteContext {
    client: Client,
    base_url: String,
    anon_key: String,
    session: watch::Receiver<Option<Session>>,
}

impl RemoteContext {
    pub fn new(settings: &RemoteSettings, session: watch::Receiver<Option<Session>>) -> Self {
        Self {
            client: Client::new(),
            base_url: normalize_base_url(&settings.url),
            anon_key: settings.anon_key.clone(),
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path starting with `/`
    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let token = self
            .session
            .borrow()
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.anon_key.clone());

        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }
}

/// Strip trailing slashes so paths can be appended directly
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

/// Best human-readable message from an error response body
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|e| e.message.or(e.msg).or(e.error_description).or(e.error))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Turn a non-success response into `AppError::Remote`
async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    tracing::debug!("Remote request failed ({}): {}", status, message);

    Err(AppError::Remote {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url(" https://abc.supabase.co/ "),
            "https://abc.supabase.co"
        );
        assert_eq!(normalize_base_url("http://localhost:54321"), "http://localhost:54321");
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"code":"23503","message":"violates foreign key constraint"}"#),
            "violates foreign key constraint"
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn test_request_uses_session_token() {
        let settings = RemoteSettings {
            url: "https://abc.supabase.co/".to_string(),
            anon_key: "anon".to_string(),
            bucket: "bills".to_string(),
            ..RemoteSettings::default()
        };
        let (tx, rx) = watch::channel(None);
        let ctx = RemoteContext::new(&settings, rx);

        let request = ctx
            .request(Method::GET, &ctx.endpoint("/rest/v1/shops"))
            .build()
            .unwrap();
        assert_eq!(request.url().as_str(), "https://abc.supabase.co/rest/v1/shops");
        assert_eq!(request.headers()["apikey"], "anon");
        assert_eq!(request.headers()["authorization"], "Bearer anon");

        tx.send(Some(Session {
            access_token: "user-token".to_string(),
            refresh_token: None,
            expires_at: None,
            user: SessionUser {
                id: "u1".to_string(),
                email: None,
            },
        }))
        .unwrap();

        let request = ctx
            .request(Method::GET, &ctx.endpoint("/rest/v1/shops"))
            .build()
            .unwrap();
        assert_eq!(request.headers()["authorization"], "Bearer user-token");
    }
}
