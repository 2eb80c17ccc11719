use reqwest::Url;
use serde::Deserialize;

use super::{AuthError, AuthSession};
use crate::browser::routes;
use crate::session::{StorageKey, User};

const GOOGLE_LOGIN_PATH: &str = "/auth/google/login";
const GOOGLE_CALLBACK_PATH: &str = "/auth/google/callback";

/// Google OAuth configuration reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GoogleAuthStatus {
    /// Whether the backend has Google credentials configured.
    #[serde(default)]
    pub google_oauth_configured: bool,
    /// Authorization URL the backend would redirect to.
    #[serde(default)]
    pub login_url: String,
}

/// Parameters Google appends to the callback route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleCallback {
    /// Authorization code to exchange.
    pub code: String,
    /// Opaque OAuth state, forwarded untouched.
    pub state: Option<String>,
}

/// Result of a successful Google callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleLogin {
    /// The authenticated user.
    pub user: User,
    /// The new bearer token.
    pub token: String,
    /// Page stored by [`AuthSession::initiate_google_login`], consumed by the
    /// callback. The browser is sent to the connect route regardless.
    pub stored_redirect: Option<String>,
}

#[derive(Deserialize)]
struct GoogleAuthResponse {
    #[serde(default)]
    success: bool,
    token: Option<String>,
    user: Option<User>,
    message: Option<String>,
}

/// Parses the query string of the Google callback route
/// (`?code=...&state=...` or `?error=...`).
///
/// # Example
/// ```rust
/// let callback = postiva_rs::parse_google_callback("?code=abc&state=xyz").unwrap();
/// assert_eq!(callback.code, "abc");
/// assert_eq!(callback.state.as_deref(), Some("xyz"));
/// ```
pub fn parse_google_callback(query: &str) -> Result<GoogleCallback, AuthError> {
    let query = query.trim_start_matches('?');

    let mut code = None;
    let mut state = None;

    for (name, value) in url_query_pairs(query) {
        match name.as_str() {
            "error" => return Err(AuthError::Provider(format!("Google OAuth error: {value}"))),
            "code" if !value.is_empty() => code = Some(value),
            "state" if !value.is_empty() => state = Some(value),
            _ => {}
        }
    }

    code.map(|code| GoogleCallback { code, state })
        .ok_or(AuthError::MissingCode)
}

fn url_query_pairs(query: &str) -> Vec<(String, String)> {
    Url::parse(&format!("http://callback.invalid/?{query}"))
        .map(|url| url.query_pairs().into_owned().collect())
        .unwrap_or_default()
}

impl AuthSession {
    /// Asks the backend whether Google login is configured.
    pub async fn check_google_auth_status(&mut self) -> Result<GoogleAuthStatus, AuthError> {
        match self.request_google_status().await {
            Ok(status) => {
                self.google_status = Some(status.clone());
                Ok(status)
            }
            Err(error) => {
                tracing::error!(%error, "checking Google auth status failed");
                self.google.error = Some(error.to_string());
                Err(error)
            }
        }
    }

    async fn request_google_status(&self) -> Result<GoogleAuthStatus, AuthError> {
        let url = self.client.endpoint(GOOGLE_LOGIN_PATH);

        let response = self.client.request_get(&url, None, None).send().await?;

        if !response.status().is_success() {
            return Err(
                AuthError::from_response(response, "Failed to check Google auth status").await,
            );
        }

        Ok(response.json::<GoogleAuthStatus>().await?)
    }

    /// Starts the Google OAuth flow.
    ///
    /// Remembers the current page under `google_auth_redirect`, then performs a
    /// full-page navigation to the backend authorization endpoint with a
    /// `redirect_uri` pointing back at the callback route of this application.
    pub fn initiate_google_login(&mut self) -> Result<(), AuthError> {
        self.google.begin();

        let result = self.redirect_to_google();

        if let Err(error) = &result {
            tracing::error!(%error, "initiating Google login failed");
        }
        self.google.finish(&result);

        result
    }

    fn redirect_to_google(&self) -> Result<(), AuthError> {
        let browser = self.client.browser();
        let redirect_uri = format!("{}{}", browser.origin(), routes::GOOGLE_CALLBACK);

        let login_url = Url::parse_with_params(
            &self.client.endpoint(GOOGLE_LOGIN_PATH),
            &[("redirect_uri", redirect_uri.as_str())],
        )
        .map_err(|error| {
            AuthError::Unsuccessful(format!("Failed to initiate Google login: {error}"))
        })?;

        self.client
            .store()
            .set(StorageKey::GoogleAuthRedirect, &browser.current_url());

        tracing::info!(%login_url, %redirect_uri, "redirecting to Google OAuth");
        browser.navigate(login_url.as_str());

        Ok(())
    }

    /// Completes the Google OAuth flow by exchanging the authorization code.
    ///
    /// Applies the same session replacement as [`AuthSession::login`]. The
    /// stored redirect is consumed and returned, but the browser always lands
    /// on the connect route.
    pub async fn handle_google_callback(
        &mut self,
        code: &str,
        state: Option<&str>,
    ) -> Result<GoogleLogin, AuthError> {
        self.google.begin();

        let result = self.exchange_google_code(code, state).await;

        if let Err(error) = &result {
            tracing::error!(%error, "Google callback failed");
        }
        self.google.finish(&result);

        result
    }

    async fn exchange_google_code(
        &mut self,
        code: &str,
        state: Option<&str>,
    ) -> Result<GoogleLogin, AuthError> {
        if code.is_empty() {
            return Err(AuthError::MissingCode);
        }

        let url = self.client.endpoint(GOOGLE_CALLBACK_PATH);

        let mut params = vec![("code", code.to_string())];
        if let Some(state) = state {
            params.push(("state", state.to_string()));
        }

        let response = self
            .client
            .request_get(&url, Some(params), None)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(
                AuthError::from_response(response, "Failed to authenticate with Google").await,
            );
        }

        let auth = response.json::<GoogleAuthResponse>().await?;

        let (token, user) = match (auth.success, auth.token, auth.user) {
            (true, Some(token), Some(user)) => (token, user),
            (true, Some(_), None) => {
                return Err(AuthError::Unsuccessful(
                    "Google authentication did not return a user".to_string(),
                ));
            }
            _ => {
                return Err(AuthError::Unsuccessful(
                    auth.message
                        .filter(|message| !message.is_empty())
                        .unwrap_or_else(|| "Authentication failed".to_string()),
                ));
            }
        };

        let store = self.client.store();
        let stored_redirect = store.get(StorageKey::GoogleAuthRedirect);
        store.remove(StorageKey::GoogleAuthRedirect);

        self.install_session(token.clone(), user.clone())?;

        tracing::info!(email = %user.email, ?stored_redirect, "Google authentication successful");

        Ok(GoogleLogin {
            user,
            token,
            stored_redirect,
        })
    }
}
