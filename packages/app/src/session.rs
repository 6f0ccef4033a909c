//! Bridges auth sessions into store requests.

use mozzi_auth::Session;
use mozzi_store::rest::AccessToken;
use tokio::sync::watch;

/// Supplies the signed-in user's access token to the store client.
pub struct SessionToken {
    session: watch::Receiver<Option<Session>>,
}

impl SessionToken {
    /// Follows the sessions published on `session`.
    #[must_use]
    pub const fn new(session: watch::Receiver<Option<Session>>) -> Self {
        Self { session }
    }
}

impl AccessToken for SessionToken {
    fn access_token(&self) -> Option<String> {
        self.session
            .borrow()
            .as_ref()
            .map(|s| s.access_token.clone())
    }
}
