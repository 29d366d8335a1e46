use std::fmt;
use std::time::Duration;
use std::time::Instant;

/// Account credentials used for the Keycloak login.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
struct AccessToken {
    token: String,
    issued_at: Instant,
}

/// Per-account login state.
///
/// Only the client writes to the session, and only while holding its lock.
#[derive(Debug)]
pub(crate) struct Session {
    pub credentials: Credentials,
    token_lifetime: Duration,
    refresh_token: Option<String>,
    access: Option<AccessToken>,
    account_id: Option<String>,
}

impl Session {
    pub fn new(credentials: Credentials, token_lifetime: Duration) -> Self {
        Self {
            credentials,
            token_lifetime,
            refresh_token: None,
            access: None,
            account_id: None,
        }
    }

    /// The access token, if one was issued less than a token lifetime ago.
    pub fn cached_token(&self, now: Instant) -> Option<&str> {
        self.access
            .as_ref()
            .filter(|a| now.saturating_duration_since(a.issued_at) < self.token_lifetime)
            .map(|a| a.token.as_str())
    }

    pub fn store_access_token(&mut self, token: String, now: Instant) {
        self.access = Some(AccessToken {
            token,
            issued_at: now,
        });
    }

    pub fn invalidate_access_token(&mut self) {
        self.access = None;
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn set_refresh_token(&mut self, token: String) {
        self.refresh_token = Some(token);
    }

    pub fn account_id(&self) -> Option<&str> {
        self.account_id.as_deref()
    }

    pub fn set_account_id(&mut self, account_id: String) {
        self.account_id = Some(account_id);
    }

    /// Forget every token. The account id survives since it is tied to the
    /// credentials, not to the login.
    pub fn clear(&mut self) {
        self.refresh_token = None;
        self.access = None;
    }
}
