use std::future::Future;
use std::time::Duration;
use std::time::Instant;

use reqwest::Client;
use reqwest::Response;
use reqwest::StatusCode;
use reqwest::header::LOCATION;
use reqwest::header::USER_AGENT;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::auth::LoginForm;
use crate::auth::Pkce;
use crate::auth::TokenResponse;
use crate::auth::UserInfo;
use crate::auth::authorization_code;
use crate::device::DeviceRecord;
use crate::device::StateValue;
use crate::device::parse_metadevices;
use crate::error::Error;
use crate::error::Result;
use crate::session::Credentials;
use crate::session::Session;

const CLIENT_ID: &str = "hubspace_android";
const REDIRECT_URI: &str = "hubspace-app://loginredirect";
const APP_USER_AGENT: &str = "Dart/2.15 (dart:io)";
/// The credential form rejects non-browser user agents.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 7.1.1; Android SDK built for x86_64 Build/NYC) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/69.0.3497.100 Safari/537.36";

/// Base URLs for the login realm and the device API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Keycloak realm, e.g. `https://accounts.hubspaceconnect.com/auth/realms/thd`
    pub auth_base: String,
    /// Afero API root, e.g. `https://api2.afero.net/v1`
    pub api_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_base: "https://accounts.hubspaceconnect.com/auth/realms/thd".to_string(),
            api_base: "https://api2.afero.net/v1".to_string(),
        }
    }
}

impl Endpoints {
    fn auth_session_url(&self) -> String {
        format!("{}/protocol/openid-connect/auth", self.auth_base)
    }

    fn login_url(&self, form: &LoginForm) -> String {
        format!(
            "{}/login-actions/authenticate?client_id={}&session_code={}&execution={}&tab_id={}",
            self.auth_base, CLIENT_ID, form.session_code, form.execution, form.tab_id
        )
    }

    fn token_url(&self) -> String {
        format!("{}/protocol/openid-connect/token", self.auth_base)
    }

    fn user_url(&self) -> String {
        format!("{}/users/me", self.api_base)
    }

    fn metadevices_url(&self, account_id: &str) -> String {
        format!("{}/accounts/{}/metadevices", self.api_base, account_id)
    }

    fn state_url(&self, account_id: &str, metadevice_id: &str) -> String {
        format!(
            "{}/accounts/{}/metadevices/{}/state",
            self.api_base, account_id, metadevice_id
        )
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub endpoints: Endpoints,
    pub request_timeout: Duration,
    /// How long an access token is reused before it is refreshed. The vendor
    /// issues tokens valid for 120 seconds.
    pub token_lifetime: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            request_timeout: Duration::from_secs(10),
            token_lifetime: Duration::from_secs(118),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatePayload<'a> {
    metadevice_id: &'a str,
    values: Vec<StateValue>,
}

/// HubSpace REST client.
///
/// Holds the account session behind a lock; every method that needs a token
/// takes the lock, so the session has a single writer at a time.
pub struct HubspaceClient {
    http: Client,
    endpoints: Endpoints,
    session: Mutex<Session>,
}

impl HubspaceClient {
    pub fn new(credentials: Credentials, options: ClientOptions) -> Result<Self> {
        let http = Client::builder()
            .timeout(options.request_timeout)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(APP_USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            endpoints: options.endpoints,
            session: Mutex::new(Session::new(credentials, options.token_lifetime)),
        })
    }

    /// Log in and look up the account id.
    ///
    /// Calling this up front is optional: any request made without a session
    /// logs in first.
    pub async fn authenticate(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        session.clear();
        self.login(&mut session).await?;
        let token = self.access_token(&mut session).await?;
        let account_id = self.fetch_account_id(&token).await?;
        info!("Authenticated with HubSpace, account {}", account_id);
        session.set_account_id(account_id);
        Ok(())
    }

    /// Fetch every device on the account together with its current state.
    ///
    /// An auth failure triggers one re-authentication and a retry of the same
    /// request before it is returned.
    pub async fn fetch_all_devices(&self) -> Result<Vec<DeviceRecord>> {
        let body = self
            .with_reauth(|token, account_id| async move {
                let response = self
                    .http
                    .get(self.endpoints.metadevices_url(&account_id))
                    .query(&[("expansions", "state")])
                    .bearer_auth(&token)
                    .send()
                    .await?;
                Ok::<_, Error>(check_status(response).await?.text().await?)
            })
            .await?;

        let devices = parse_metadevices(&body)?;
        debug!("Fetched {} devices", devices.len());
        Ok(devices)
    }

    /// Push new state values for a metadevice.
    pub async fn set_state(&self, metadevice_id: &str, values: &[StateValue]) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let payload = StatePayload {
            metadevice_id,
            values: values
                .iter()
                .cloned()
                .map(|mut v| {
                    v.last_update_time = Some(now);
                    v
                })
                .collect(),
        };
        let payload = &payload;

        self.with_reauth(|token, account_id| async move {
            let response = self
                .http
                .put(self.endpoints.state_url(&account_id, metadevice_id))
                .bearer_auth(&token)
                .json(payload)
                .send()
                .await?;
            check_status(response).await?;
            Ok::<_, Error>(())
        })
        .await?;

        debug!("Pushed {} values to {}", values.len(), metadevice_id);
        Ok(())
    }

    /// Run `op` with a token and account id, re-authenticating once if the
    /// vendor rejects the token.
    ///
    /// A rejection while building the context (a dead refresh token, or
    /// `/users/me` answering 401) takes the same path as one from `op`.
    async fn with_reauth<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(String, String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let first = match self.request_context().await {
            Ok((token, account_id)) => op(token, account_id).await,
            Err(e) => Err(e),
        };
        match first {
            Err(Error::Auth(reason)) => {
                warn!("Request rejected ({}), re-authenticating", reason);
                self.reauthenticate().await?;
                let (token, account_id) = self.request_context().await?;
                op(token, account_id).await
            }
            other => other,
        }
    }

    async fn request_context(&self) -> Result<(String, String)> {
        let mut session = self.session.lock().await;
        if session.refresh_token().is_none() {
            self.login(&mut session).await?;
        }
        let token = self.access_token(&mut session).await?;
        let account_id = match session.account_id() {
            Some(id) => id.to_string(),
            None => {
                let id = self.fetch_account_id(&token).await?;
                session.set_account_id(id.clone());
                id
            }
        };
        Ok((token, account_id))
    }

    /// Get a fresh access token from the refresh token, or log in again if
    /// the refresh token is no longer accepted.
    async fn reauthenticate(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        session.invalidate_access_token();
        match self.access_token(&mut session).await {
            Ok(_) => Ok(()),
            Err(Error::Auth(reason)) => {
                warn!("Token refresh rejected ({}), logging in again", reason);
                session.clear();
                self.login(&mut session).await
            }
            Err(e) => Err(e),
        }
    }

    /// Full PKCE login, leaving a refresh token (and usually an access token)
    /// in the session.
    async fn login(&self, session: &mut Session) -> Result<()> {
        debug!("Logging in as {}", session.credentials.username);
        let pkce = Pkce::generate();

        let response = self
            .http
            .get(self.endpoints.auth_session_url())
            .query(&[
                ("response_type", "code"),
                ("client_id", CLIENT_ID),
                ("redirect_uri", REDIRECT_URI),
                ("code_challenge", pkce.challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("scope", "openid offline_access"),
            ])
            .send()
            .await?;
        let page = check_status(response).await?.text().await?;
        let form = LoginForm::scrape(&page)?;

        let response = self
            .http
            .post(self.endpoints.login_url(&form))
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .form(&[
                ("username", session.credentials.username.as_str()),
                ("password", session.credentials.password.as_str()),
                ("credentialId", ""),
            ])
            .send()
            .await?;

        // Keycloak answers a good login with a redirect to the app; a bad one
        // re-renders the form with 200.
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                Error::Auth(format!(
                    "credentials rejected (HTTP {})",
                    response.status().as_u16()
                ))
            })?;
        let code = authorization_code(location)?;

        let tokens = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", REDIRECT_URI),
                ("code_verifier", pkce.verifier.as_str()),
                ("client_id", CLIENT_ID),
            ])
            .await?;

        let refresh_token = tokens
            .refresh_token
            .ok_or_else(|| Error::Parse("token response missing refresh_token".to_string()))?;
        session.set_refresh_token(refresh_token);
        if let Some(token) = tokens.id_token {
            session.store_access_token(token, Instant::now());
        }

        Ok(())
    }

    async fn access_token(&self, session: &mut Session) -> Result<String> {
        if let Some(token) = session.cached_token(Instant::now()) {
            debug!("Reusing access token");
            return Ok(token.to_string());
        }

        let refresh_token = session
            .refresh_token()
            .ok_or_else(|| Error::Auth("no refresh token".to_string()))?
            .to_string();

        debug!("Refreshing access token");
        let tokens = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("scope", "openid email offline_access profile"),
                ("client_id", CLIENT_ID),
            ])
            .await?;

        let token = tokens
            .id_token
            .ok_or_else(|| Error::Parse("token response missing id_token".to_string()))?;
        if let Some(rotated) = tokens.refresh_token {
            session.set_refresh_token(rotated);
        }
        session.store_access_token(token.clone(), Instant::now());
        Ok(token)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(self.endpoints.token_url())
            .form(form)
            .send()
            .await?;

        // The token endpoint reports a dead grant as 400 invalid_grant.
        if response.status() == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("token grant rejected: {}", body)));
        }

        let body = check_status(response).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| Error::Parse(format!("token response: {}", e)))
    }

    async fn fetch_account_id(&self, token: &str) -> Result<String> {
        let response = self
            .http
            .get(self.endpoints.user_url())
            .bearer_auth(token)
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;
        let info: UserInfo = serde_json::from_str(&body)
            .map_err(|e| Error::Parse(format!("user info: {}", e)))?;
        info.into_account_id()
    }
}

/// Map non-success statuses onto the error taxonomy.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(Error::Auth(format!("HTTP {}", status.as_u16())))
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(Error::Http {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use mockito::Mock;
    use mockito::Server;
    use mockito::ServerGuard;
    use serde_json::json;

    use super::*;

    const LOGIN_PAGE: &str = r#"<form id="kc-form-login" action="/auth/realms/thd/login-actions/authenticate?session_code=sc1&amp;execution=ex1&amp;client_id=hubspace_android&amp;tab_id=tab1&amp;client_data=cd">"#;

    fn client_for(server: &ServerGuard) -> HubspaceClient {
        client_with_lifetime(server, Duration::from_secs(118))
    }

    fn client_with_lifetime(server: &ServerGuard, token_lifetime: Duration) -> HubspaceClient {
        let options = ClientOptions {
            endpoints: Endpoints {
                auth_base: format!("{}/auth/realms/thd", server.url()),
                api_base: format!("{}/v1", server.url()),
            },
            request_timeout: Duration::from_secs(5),
            token_lifetime,
        };
        HubspaceClient::new(Credentials::new("user@example.com", "hunter2"), options).unwrap()
    }

    /// Mocks for the full login: auth page, credential post and code grant.
    /// The code grant hands out `token-1`.
    async fn mock_login(server: &mut ServerGuard) -> Vec<Mock> {
        mock_login_times(server, 1).await
    }

    /// Same as [`mock_login`], but each step expects `hits` requests.
    async fn mock_login_times(server: &mut ServerGuard, hits: usize) -> Vec<Mock> {
        let page = server
            .mock("GET", "/auth/realms/thd/protocol/openid-connect/auth")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("client_id".into(), "hubspace_android".into()),
                Matcher::UrlEncoded("code_challenge_method".into(), "S256".into()),
            ]))
            .with_status(200)
            .with_body(LOGIN_PAGE)
            .expect(hits)
            .create_async()
            .await;

        let credentials = server
            .mock("POST", "/auth/realms/thd/login-actions/authenticate")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("session_code".into(), "sc1".into()),
                Matcher::UrlEncoded("execution".into(), "ex1".into()),
                Matcher::UrlEncoded("tab_id".into(), "tab1".into()),
            ]))
            .match_body(Matcher::Regex("username=user%40example.com".into()))
            .with_status(302)
            .with_header(
                "location",
                "hubspace-app://loginredirect?state=x&session_state=ss&code=auth-code",
            )
            .expect(hits)
            .create_async()
            .await;

        let grant = server
            .mock("POST", "/auth/realms/thd/protocol/openid-connect/token")
            .match_body(Matcher::Regex("grant_type=authorization_code".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"refresh_token": "refresh-1", "id_token": "token-1"}).to_string())
            .expect(hits)
            .create_async()
            .await;

        vec![page, credentials, grant]
    }

    async fn mock_account(server: &mut ServerGuard) -> Mock {
        server
            .mock("GET", "/v1/users/me")
            .with_status(200)
            .with_body(json!({"accountAccess": [{"account": {"accountId": "acct-1"}}]}).to_string())
            .create_async()
            .await
    }

    fn listing() -> String {
        json!([
            {
                "id": "md-1",
                "typeId": "metadevice.device",
                "friendlyName": "Porch Switch",
                "description": {"device": {"deviceClass": "switch"}, "functions": []},
                "state": {"values": [{"functionClass": "power", "value": "on"}]}
            }
        ])
        .to_string()
    }

    #[tokio::test]
    async fn test_authenticate_and_fetch() {
        let mut server = Server::new_async().await;
        let login = mock_login(&mut server).await;
        let account = mock_account(&mut server).await;
        let devices_mock = server
            .mock("GET", "/v1/accounts/acct-1/metadevices")
            .match_query(Matcher::UrlEncoded("expansions".into(), "state".into()))
            .match_header("authorization", "Bearer token-1")
            .with_status(200)
            .with_body(listing())
            .create_async()
            .await;

        let client = client_for(&server);
        client.authenticate().await.unwrap();
        let devices = client.fetch_all_devices().await.unwrap();

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "Porch Switch");
        for m in login {
            m.assert_async().await;
        }
        account.assert_async().await;
        devices_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_logs_in_lazily() {
        let mut server = Server::new_async().await;
        let _login = mock_login(&mut server).await;
        let account = mock_account(&mut server).await;
        let devices_mock = server
            .mock("GET", "/v1/accounts/acct-1/metadevices")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(listing())
            .create_async()
            .await;

        let client = client_for(&server);
        let devices = client.fetch_all_devices().await.unwrap();

        assert_eq!(devices.len(), 1);
        account.assert_async().await;
        devices_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_expired_token_reauthenticates_once_and_retries() {
        let mut server = Server::new_async().await;
        let _login = mock_login(&mut server).await;
        let _account = mock_account(&mut server).await;

        let refresh = server
            .mock("POST", "/auth/realms/thd/protocol/openid-connect/token")
            .match_body(Matcher::Regex("grant_type=refresh_token".into()))
            .with_status(200)
            .with_body(json!({"id_token": "token-2"}).to_string())
            .expect(1)
            .create_async()
            .await;

        let expired = server
            .mock("GET", "/v1/accounts/acct-1/metadevices")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer token-1")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;

        let fresh = server
            .mock("GET", "/v1/accounts/acct-1/metadevices")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer token-2")
            .with_status(200)
            .with_body(listing())
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        client.authenticate().await.unwrap();
        let devices = client.fetch_all_devices().await.unwrap();

        assert_eq!(devices.len(), 1);
        refresh.assert_async().await;
        expired.assert_async().await;
        fresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_second_auth_failure_is_surfaced() {
        let mut server = Server::new_async().await;
        let _login = mock_login(&mut server).await;
        let _account = mock_account(&mut server).await;

        let _refresh = server
            .mock("POST", "/auth/realms/thd/protocol/openid-connect/token")
            .match_body(Matcher::Regex("grant_type=refresh_token".into()))
            .with_status(200)
            .with_body(json!({"id_token": "token-2"}).to_string())
            .create_async()
            .await;

        let rejected = server
            .mock("GET", "/v1/accounts/acct-1/metadevices")
            .match_query(Matcher::Any)
            .with_status(401)
            .expect(2)
            .create_async()
            .await;

        let client = client_for(&server);
        client.authenticate().await.unwrap();
        let err = client.fetch_all_devices().await.unwrap_err();

        assert!(err.is_auth());
        rejected.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_refresh_token_falls_back_to_full_login() {
        let mut server = Server::new_async().await;
        let login = mock_login_times(&mut server, 2).await;
        let _account = mock_account(&mut server).await;

        let refresh = server
            .mock("POST", "/auth/realms/thd/protocol/openid-connect/token")
            .match_body(Matcher::Regex("grant_type=refresh_token".into()))
            .with_status(400)
            .with_body(json!({"error": "invalid_grant"}).to_string())
            .expect_at_least(1)
            .create_async()
            .await;

        let devices_mock = server
            .mock("GET", "/v1/accounts/acct-1/metadevices")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer token-1")
            .with_status(200)
            .with_body(listing())
            .expect(1)
            .create_async()
            .await;

        let client = client_with_lifetime(&server, Duration::from_millis(200));
        client.authenticate().await.unwrap();

        // Let the access token age out so the next call needs the refresh grant.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let devices = client.fetch_all_devices().await.unwrap();

        assert_eq!(devices.len(), 1);
        refresh.assert_async().await;
        for m in login {
            m.assert_async().await;
        }
        devices_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_account_lookup_reauthenticates() {
        let mut server = Server::new_async().await;
        let _login = mock_login(&mut server).await;

        let refresh = server
            .mock("POST", "/auth/realms/thd/protocol/openid-connect/token")
            .match_body(Matcher::Regex("grant_type=refresh_token".into()))
            .with_status(200)
            .with_body(json!({"id_token": "token-2"}).to_string())
            .expect(1)
            .create_async()
            .await;

        let stale = server
            .mock("GET", "/v1/users/me")
            .match_header("authorization", "Bearer token-1")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let _account = server
            .mock("GET", "/v1/users/me")
            .match_header("authorization", "Bearer token-2")
            .with_status(200)
            .with_body(json!({"accountAccess": [{"account": {"accountId": "acct-1"}}]}).to_string())
            .create_async()
            .await;

        let devices_mock = server
            .mock("GET", "/v1/accounts/acct-1/metadevices")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer token-2")
            .with_status(200)
            .with_body(listing())
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let devices = client.fetch_all_devices().await.unwrap();

        assert_eq!(devices.len(), 1);
        refresh.assert_async().await;
        stale.assert_async().await;
        devices_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_listing_is_parse_error() {
        let mut server = Server::new_async().await;
        let _login = mock_login(&mut server).await;
        let _account = mock_account(&mut server).await;
        let _devices = server
            .mock("GET", "/v1/accounts/acct-1/metadevices")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"message": "unexpected"}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.fetch_all_devices().await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_http_error() {
        let mut server = Server::new_async().await;
        let _login = mock_login(&mut server).await;
        let _account = mock_account(&mut server).await;
        let _devices = server
            .mock("GET", "/v1/accounts/acct-1/metadevices")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.fetch_all_devices().await.unwrap_err();
        assert!(matches!(err, Error::Http { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_bad_credentials_are_auth_error() {
        let mut server = Server::new_async().await;
        let _page = server
            .mock("GET", "/auth/realms/thd/protocol/openid-connect/auth")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(LOGIN_PAGE)
            .create_async()
            .await;
        let _form = server
            .mock("POST", "/auth/realms/thd/login-actions/authenticate")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>Invalid username or password.</html>")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.authenticate().await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let options = ClientOptions {
            endpoints: Endpoints {
                auth_base: "http://127.0.0.1:1/auth/realms/thd".to_string(),
                api_base: "http://127.0.0.1:1/v1".to_string(),
            },
            request_timeout: Duration::from_secs(2),
            token_lifetime: Duration::from_secs(118),
        };
        let client = HubspaceClient::new(Credentials::new("u", "p"), options).unwrap();
        let err = client.fetch_all_devices().await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn test_set_state_payload() {
        let mut server = Server::new_async().await;
        let _login = mock_login(&mut server).await;
        let _account = mock_account(&mut server).await;
        let put = server
            .mock("PUT", "/v1/accounts/acct-1/metadevices/md-1/state")
            .match_header("authorization", "Bearer token-1")
            .match_body(Matcher::PartialJson(json!({
                "metadeviceId": "md-1",
                "values": [{"functionClass": "power", "functionInstance": "fan-power", "value": "off"}]
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let client = client_for(&server);
        client
            .set_state("md-1", &[StateValue::new("power", Some("fan-power"), "off")])
            .await
            .unwrap();
        put.assert_async().await;
    }
}
