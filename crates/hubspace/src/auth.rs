//! Pieces of the Keycloak login flow that don't touch the network.

use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use regex::Regex;
use serde::Deserialize;
use sha2::Digest;
use sha2::Sha256;

use crate::error::Error;
use crate::error::Result;

/// PKCE verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub(crate) struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 40];
        rand::thread_rng().fill_bytes(&mut bytes);

        // Keycloak only accepts [A-Za-z0-9] in the verifier, so the base64
        // punctuation and padding get dropped.
        let verifier: String = URL_SAFE
            .encode(bytes)
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        Self::from_verifier(verifier)
    }

    pub fn from_verifier(verifier: String) -> Self {
        let digest = Sha256::digest(verifier.as_bytes());
        let challenge = URL_SAFE_NO_PAD.encode(digest);
        Self {
            verifier,
            challenge,
        }
    }
}

static SESSION_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"session_code=(.+?)&").expect("valid regex"));
static EXECUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"execution=(.+?)&").expect("valid regex"));
static TAB_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tab_id=(.+?)&").expect("valid regex"));
static AUTH_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]code=(.+?)$").expect("valid regex"));

/// Hidden parameters of the login form served by the auth session page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoginForm {
    pub session_code: String,
    pub execution: String,
    pub tab_id: String,
}

impl LoginForm {
    /// Scrape the form action out of the login page HTML.
    pub fn scrape(page: &str) -> Result<Self> {
        Ok(Self {
            session_code: capture(&SESSION_CODE, page)?,
            execution: capture(&EXECUTION, page)?,
            tab_id: capture(&TAB_ID, page)?,
        })
    }
}

/// Extract the authorization code from the redirect issued after a
/// successful credential post.
pub(crate) fn authorization_code(location: &str) -> Result<String> {
    capture(&AUTH_CODE, location)
}

fn capture(re: &Regex, haystack: &str) -> Result<String> {
    re.captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::Auth(format!("login response did not match {}", re.as_str())))
}

/// Body of the OpenID token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Body of `GET /users/me`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserInfo {
    pub account_access: Vec<AccountAccess>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountAccess {
    pub account: Account,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Account {
    pub account_id: String,
}

impl UserInfo {
    pub fn into_account_id(self) -> Result<String> {
        self.account_access
            .into_iter()
            .next()
            .map(|a| a.account.account_id)
            .ok_or_else(|| Error::Parse("user has no account access entries".to_string()))
    }
}
