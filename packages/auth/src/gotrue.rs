//! `GoTrue` (hosted auth) adapter.
//!
//! See <https://github.com/supabase/auth#endpoints>

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Response;
use serde::Deserialize;
use tokio::sync::watch;

use crate::{AuthError, AuthService, Session, SignUpOutcome, User};

/// Token response for password and refresh grants.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_in.map(|s| Utc::now() + Duration::seconds(s)),
            user: self.user,
        }
    }
}

/// `/signup` returns either a full token response (auto-confirm) or the
/// bare user awaiting confirmation.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    Pending(#[allow(dead_code)] User),
}

/// Any of the error shapes `GoTrue` returns.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

/// HTTP client for the hosted auth service.
pub struct GoTrueAuth {
    client: reqwest::Client,
    auth_url: String,
    anon_key: String,
    session: watch::Sender<Option<Session>>,
}

impl GoTrueAuth {
    /// Creates an auth client for a project root URL.
    #[must_use]
    pub fn new(project_url: &str, anon_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth_url: format!("{}/auth/v1", project_url.trim_end_matches('/')),
            anon_key: anon_key.into(),
            session: watch::Sender::new(None),
        }
    }

    async fn token(&self, grant_type: &str, body: serde_json::Value) -> Result<Session, AuthError> {
        let resp = self
            .client
            .post(format!("{}/token", self.auth_url))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;
        let token: TokenResponse = check(resp).await?.json().await?;
        Ok(token.into_session())
    }

    fn publish(&self, session: Option<Session>) {
        self.session.send_replace(session);
    }
}

#[async_trait]
impl AuthService for GoTrueAuth {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(session) = self.session.borrow().clone() else {
            return Ok(None);
        };
        if !session.is_expired(Utc::now()) {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token else {
            log::info!("Session expired without a refresh token; signing out");
            self.publish(None);
            return Ok(None);
        };

        match self
            .token(
                "refresh_token",
                serde_json::json!({ "refresh_token": refresh_token }),
            )
            .await
        {
            Ok(fresh) => {
                self.publish(Some(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(e) => {
                log::warn!("Session refresh failed: {e}");
                self.publish(None);
                Err(e)
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let session = self
            .token(
                "password",
                serde_json::json!({ "email": email, "password": password }),
            )
            .await?;
        log::info!("Signed in as {}", session.user.id);
        self.publish(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        let resp = self
            .client
            .post(format!("{}/signup", self.auth_url))
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body: SignUpResponse = check(resp).await?.json().await?;

        Ok(match body {
            SignUpResponse::Session(token) => {
                let session = token.into_session();
                self.publish(Some(session.clone()));
                SignUpOutcome::SignedIn(session)
            }
            SignUpResponse::Pending(_) => SignUpOutcome::ConfirmationSent,
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let token = self.session.borrow().as_ref().map(|s| s.access_token.clone());
        self.publish(None);

        let Some(token) = token else {
            return Ok(());
        };

        let result = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await;

        match result {
            Ok(resp) => {
                if let Err(e) = check(resp).await {
                    log::warn!("Remote sign-out failed: {e}");
                }
            }
            Err(e) => log::warn!("Remote sign-out failed: {e}"),
        }
        Ok(())
    }

    fn watch(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }
}

async fn check(resp: Response) -> Result<Response, AuthError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    Err(rejection(status.as_u16(), &text))
}

fn rejection(status: u16, body: &str) -> AuthError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or_default();
    AuthError::Rejected { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_password_grant_error() {
        let err = rejection(
            400,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(err.user_message(), "Invalid login credentials");
    }

    #[test]
    fn parses_signup_error() {
        let err = rejection(422, r#"{"code":422,"msg":"User already registered"}"#);
        assert_eq!(err.user_message(), "User already registered");
    }

    #[test]
    fn unparseable_error_uses_fallback() {
        let err = rejection(500, "<html>oops</html>");
        assert_eq!(err.user_message(), crate::FALLBACK_MESSAGE);
    }

    #[test]
    fn signup_without_token_is_pending() {
        let body: SignUpResponse = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "email": "new@jeju.kr",
            "confirmation_sent_at": "2024-05-01T00:00:00Z"
        }))
        .unwrap();
        assert!(matches!(body, SignUpResponse::Pending(_)));
    }

    #[test]
    fn signup_with_token_signs_in() {
        let body: SignUpResponse = serde_json::from_value(serde_json::json!({
            "access_token": "jwt",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": { "id": "abc", "email": "new@jeju.kr" }
        }))
        .unwrap();
        let SignUpResponse::Session(token) = body else {
            panic!("expected a session");
        };
        let session = token.into_session();
        assert_eq!(session.user.email.as_deref(), Some("new@jeju.kr"));
        assert!(session.expires_at.is_some());
    }

    #[tokio::test]
    async fn sign_out_without_session_is_local_only() {
        let auth = GoTrueAuth::new("http://127.0.0.1:9", "anon");
        let rx = auth.watch();
        auth.sign_out().await.unwrap();
        assert!(rx.borrow().is_none());
    }
}
