//! In-process accounts, for tests and offline use.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::{AuthError, AuthService, Session, SignUpOutcome, User};

struct Account {
    id: String,
    password: String,
    confirmed: bool,
}

/// An [`AuthService`] that keeps accounts in memory.
///
/// Sessions never expire. When `require_confirmation` is set, new
/// accounts stay unconfirmed until [`MemoryAuth::confirm`] is called.
pub struct MemoryAuth {
    accounts: Mutex<BTreeMap<String, Account>>,
    require_confirmation: bool,
    session: watch::Sender<Option<Session>>,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new(false)
    }
}

impl MemoryAuth {
    /// Creates an empty account list.
    #[must_use]
    pub fn new(require_confirmation: bool) -> Self {
        Self {
            accounts: Mutex::new(BTreeMap::new()),
            require_confirmation,
            session: watch::Sender::new(None),
        }
    }

    /// Adds a confirmed account.
    #[must_use]
    pub fn with_account(self, email: &str, password: &str) -> Self {
        self.lock().insert(
            email.to_string(),
            Account {
                id: uuid::Uuid::new_v4().to_string(),
                password: password.to_string(),
                confirmed: true,
            },
        );
        self
    }

    /// Marks an account as confirmed. Returns `false` if it does not exist.
    pub fn confirm(&self, email: &str) -> bool {
        self.lock().get_mut(email).is_some_and(|a| {
            a.confirmed = true;
            true
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Account>> {
        self.accounts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn start_session(&self, id: &str, email: &str) -> Session {
        let session = Session {
            access_token: uuid::Uuid::new_v4().to_string(),
            refresh_token: None,
            expires_at: None,
            user: User {
                id: id.to_string(),
                email: Some(email.to_string()),
            },
        };
        self.session.send_replace(Some(session.clone()));
        session
    }
}

fn rejected(status: u16, message: &str) -> AuthError {
    AuthError::Rejected {
        status,
        message: message.to_string(),
    }
}

#[async_trait]
impl AuthService for MemoryAuth {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        Ok(self.session.borrow().clone())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let id = {
            let accounts = self.lock();
            let account = accounts
                .get(email)
                .filter(|a| a.password == password)
                .ok_or_else(|| rejected(400, "Invalid login credentials"))?;
            if !account.confirmed {
                return Err(rejected(400, "Email not confirmed"));
            }
            account.id.clone()
        };
        Ok(self.start_session(&id, email))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        if email.trim().is_empty() || !email.contains('@') {
            return Err(rejected(422, "Unable to validate email address: invalid format"));
        }
        if password.len() < 6 {
            return Err(rejected(422, "Password should be at least 6 characters."));
        }

        let id = uuid::Uuid::new_v4().to_string();
        {
            let mut accounts = self.lock();
            if accounts.contains_key(email) {
                return Err(rejected(422, "User already registered"));
            }
            accounts.insert(
                email.to_string(),
                Account {
                    id: id.clone(),
                    password: password.to_string(),
                    confirmed: !self.require_confirmation,
                },
            );
        }

        if self.require_confirmation {
            return Ok(SignUpOutcome::ConfirmationSent);
        }
        Ok(SignUpOutcome::SignedIn(self.start_session(&id, email)))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.session.send_replace(None);
        Ok(())
    }

    fn watch(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }
}
