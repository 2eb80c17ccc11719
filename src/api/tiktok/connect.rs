use serde::Deserialize;
use thiserror::Error;

use crate::browser::{PopupFeatures, PopupOutcome};
use crate::error::ErrorBody;
use crate::{ApiEnvelope, Postiva};

const CREATE_TOKEN_PATH: &str = "/tiktok/create-token";
const TEST_USER_PATH: &str = "/tiktok/add-test-user";
const POPUP_NAME: &str = "tiktok_oauth_popup";

/// Represents errors of the TikTok account-linking flows.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// No bearer token is stored. Nothing was sent. Holds the attempted action.
    #[error("You must be logged in to {0}")]
    NotLoggedIn(&'static str),
    /// The backend refused to create the TikTok authorization URL.
    #[error("{0}")]
    TokenCreationFailed(String),
    /// The backend refused to create the test-user URL.
    #[error("{0}")]
    TestUserFailed(String),
    /// No new tab could be opened for the test-user URL.
    #[error("Could not open a new tab for {0}")]
    TabBlocked(String),
    /// Communication with the backend failed.
    #[error("The communication with the Postiva API failed: {0}")]
    Unreachable(String),
    /// The response could not be parsed into the expected data structure.
    #[error("Could not parse response into the expected data structure: {0}")]
    ParseError(String),
}

impl From<reqwest::Error> for ConnectError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::Unreachable(error.to_string())
        }
    }
}

/// State of the linking flows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectState {
    /// A request is in flight.
    pub is_loading: bool,
    /// Message of the last failure.
    pub error: Option<String>,
    /// Authorization URL of the last primary connect.
    pub auth_url: Option<String>,
    /// URL of the last test-user link.
    pub test_user_url: Option<String>,
    /// The last operation obtained its URL and opened it.
    pub success: bool,
}

/// How the TikTok authorization page was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// In the OAuth popup; the application stays open.
    Popup {
        /// The authorization URL.
        auth_url: String,
    },
    /// The popup was blocked, the current page navigated away instead.
    Redirected {
        /// The authorization URL.
        auth_url: String,
    },
}

impl ConnectOutcome {
    /// The authorization URL, whatever the browsing context.
    #[must_use]
    pub fn auth_url(&self) -> &str {
        match self {
            Self::Popup { auth_url } | Self::Redirected { auth_url } => auth_url,
        }
    }
}

#[derive(Deserialize)]
struct CreateTokenData {
    auth_url: Option<String>,
}

#[derive(Deserialize)]
struct TestUserData {
    test_user_url: Option<String>,
}

/// TikTok account-linking manager.
///
/// Success means "URL obtained and a browsing context opened"; the linking
/// itself completes out of band in that context.
#[derive(Debug)]
pub struct TikTokConnect {
    client: Postiva,
    state: ConnectState,
}

impl TikTokConnect {
    pub(crate) const fn new(client: Postiva) -> Self {
        Self {
            client,
            state: ConnectState {
                is_loading: false,
                error: None,
                auth_url: None,
                test_user_url: None,
                success: false,
            },
        }
    }

    /// Current state of the linking flows.
    #[must_use]
    pub const fn state(&self) -> &ConnectState {
        &self.state
    }

    /// Dismisses the error message.
    pub fn clear_error(&mut self) {
        self.state.error = None;
    }

    /// Starts the TikTok OAuth link.
    ///
    /// Opens the authorization URL in a centred popup, and falls back to a
    /// full-page redirect when the popup is blocked.
    ///
    /// # Example
    /// ```rust,ignore
    /// match client.tiktok_connect().initiate_connect().await? {
    ///     ConnectOutcome::Popup { .. } => println!("Finish the login in the popup"),
    ///     ConnectOutcome::Redirected { .. } => println!("Redirected to TikTok"),
    /// }
    /// ```
    pub async fn initiate_connect(&mut self) -> Result<ConnectOutcome, ConnectError> {
        self.state.is_loading = true;
        self.state.error = None;
        self.state.auth_url = None;
        self.state.success = false;

        let result = match self.request_auth_url().await {
            Ok(auth_url) => {
                self.state.auth_url = Some(auth_url.clone());
                self.state.success = true;
                Ok(self.open_auth_window(auth_url))
            }
            Err(error) => Err(error),
        };

        self.finish(&result, "TikTok connect error");
        result
    }

    /// Links a TikTok test user: the URL is always opened in a new tab.
    pub async fn initiate_test_user_connect(&mut self) -> Result<String, ConnectError> {
        self.state.is_loading = true;
        self.state.error = None;
        self.state.test_user_url = None;
        self.state.success = false;

        let result = match self.request_test_user_url().await {
            Ok(test_user_url) => {
                self.state.test_user_url = Some(test_user_url.clone());

                if self.client.browser().open_tab(&test_user_url) {
                    self.state.success = true;
                    Ok(test_user_url)
                } else {
                    Err(ConnectError::TabBlocked(test_user_url))
                }
            }
            Err(error) => Err(error),
        };

        self.finish(&result, "TikTok test user error");
        result
    }

    fn finish<T>(&mut self, result: &Result<T, ConnectError>, context: &str) {
        self.state.is_loading = false;

        if let Err(error) = result {
            tracing::error!(%error, "{context}");
            self.state.error = Some(error.to_string());
        }
    }

    fn open_auth_window(&self, auth_url: String) -> ConnectOutcome {
        let browser = self.client.browser();
        let features = PopupFeatures::centered(browser.window_geometry());

        match browser.open_popup(&auth_url, POPUP_NAME, &features) {
            PopupOutcome::Opened => {
                tracing::info!("opened TikTok OAuth popup");
                ConnectOutcome::Popup { auth_url }
            }
            outcome @ (PopupOutcome::Blocked | PopupOutcome::Closed) => {
                tracing::warn!(?outcome, "popup blocked; redirecting current tab to TikTok");
                browser.navigate(&auth_url);
                ConnectOutcome::Redirected { auth_url }
            }
        }
    }

    async fn request_auth_url(&self) -> Result<String, ConnectError> {
        let token = self
            .client
            .token()
            .ok_or(ConnectError::NotLoggedIn("connect TikTok"))?;
        let url = self.client.endpoint(CREATE_TOKEN_PATH);

        let response = self
            .client
            .request_post_json(&url, &serde_json::json!({}), Some(&token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = ErrorBody::read(response).await;

            return Err(ConnectError::TokenCreationFailed(body.message().unwrap_or_else(
                || format!("HTTP {status}: Failed to create TikTok token"),
            )));
        }

        let envelope = response.json::<ApiEnvelope<CreateTokenData>>().await?;
        tracing::debug!(
            success = envelope.success,
            message = %envelope.message,
            "TikTok create-token response"
        );

        match envelope.data.and_then(|data| data.auth_url) {
            Some(auth_url) if envelope.success && !auth_url.is_empty() => Ok(auth_url),
            _ => Err(ConnectError::TokenCreationFailed(non_empty_or(
                envelope.message,
                "Failed to get TikTok auth URL",
            ))),
        }
    }

    async fn request_test_user_url(&self) -> Result<String, ConnectError> {
        let token = self
            .client
            .token()
            .ok_or(ConnectError::NotLoggedIn("add TikTok test user"))?;
        let url = self.client.endpoint(TEST_USER_PATH);

        let response = self
            .client
            .request_post_json(&url, &serde_json::json!({}), Some(&token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = ErrorBody::read(response).await;

            return Err(ConnectError::TestUserFailed(body.message().unwrap_or_else(
                || format!("HTTP {status}: Failed to add TikTok test user"),
            )));
        }

        let envelope = response.json::<ApiEnvelope<TestUserData>>().await?;
        tracing::debug!(
            success = envelope.success,
            message = %envelope.message,
            "TikTok test user response"
        );

        match envelope.data.and_then(|data| data.test_user_url) {
            Some(test_user_url) if envelope.success && !test_user_url.is_empty() => {
                Ok(test_user_url)
            }
            _ => Err(ConnectError::TestUserFailed(non_empty_or(
                envelope.message,
                "Failed to get TikTok test user URL",
            ))),
        }
    }
}

fn non_empty_or(message: String, fallback: &str) -> String {
    if message.is_empty() {
        fallback.to_string()
    } else {
        message
    }
}
