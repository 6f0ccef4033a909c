#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Email/password sessions for the mozzi map.
//!
//! Reporting requires a signed-in user; browsing does not. The
//! [`AuthService`] trait exposes the current session and a
//! [`tokio::sync::watch`] channel that fires on every sign-in and
//! sign-out, so the rest of the app can react without polling.

pub mod gotrue;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

/// Shown after a sign-up that still needs email confirmation.
pub const CONFIRMATION_SENT_MESSAGE: &str = "가입 확인 이메일을 보냈습니다!";

/// Shown when an auth failure carries no usable message.
pub const FALLBACK_MESSAGE: &str = "인증 정보를 확인해주세요.";

/// An authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Opaque user id.
    pub id: String,
    /// Email address, if the provider returned one.
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    /// Name shown in the header: the part of the email before `@`.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|s| !s.is_empty())
    }
}

/// A signed-in session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token for store requests.
    pub access_token: String,
    /// Token used to obtain a new access token.
    pub refresh_token: Option<String>,
    /// When the access token stops being valid.
    pub expires_at: Option<DateTime<Utc>>,
    /// The signed-in user.
    pub user: User,
}

impl Session {
    /// Whether the access token has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Result of a sign-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The account is active and the user is now signed in.
    SignedIn(Session),
    /// The account exists but must be confirmed by email first.
    ConfirmationSent,
}

/// Errors from authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The auth service refused the request.
    #[error("{message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Message from the auth service.
        message: String,
    },
}

impl AuthError {
    /// Short message suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } if !message.trim().is_empty() => message.clone(),
            _ => FALLBACK_MESSAGE.to_string(),
        }
    }
}

/// Session management.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Returns the current session, refreshing it first if it has
    /// expired.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if a needed refresh fails.
    async fn current_session(&self) -> Result<Option<Session>, AuthError>;

    /// Signs in with email and password.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] on bad credentials or transport failure.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// Creates an account.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] if the account cannot be created.
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError>;

    /// Ends the current session. Local state is cleared even if the
    /// remote call fails.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] only for failures worth surfacing.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Subscribes to session changes.
    fn watch(&self) -> watch::Receiver<Option<Session>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: Option<&str>) -> User {
        User {
            id: "u1".to_string(),
            email: email.map(String::from),
        }
    }

    #[test]
    fn display_name_is_email_local_part() {
        assert_eq!(user(Some("mozzi@jeju.kr")).display_name(), Some("mozzi"));
        assert_eq!(user(None).display_name(), None);
        assert_eq!(user(Some("@jeju.kr")).display_name(), None);
    }

    #[test]
    fn user_message_falls_back_when_empty() {
        let err = AuthError::Rejected {
            status: 400,
            message: "Invalid login credentials".to_string(),
        };
        assert_eq!(err.user_message(), "Invalid login credentials");

        let err = AuthError::Rejected {
            status: 500,
            message: "  ".to_string(),
        };
        assert_eq!(err.user_message(), FALLBACK_MESSAGE);
    }

    #[test]
    fn session_expiry() {
        let now = Utc::now();
        let session = Session {
            access_token: "t".to_string(),
            refresh_token: None,
            expires_at: Some(now),
            user: user(None),
        };
        assert!(session.is_expired(now));
        assert!(!session.is_expired(now - chrono::Duration::seconds(1)));
    }
}
