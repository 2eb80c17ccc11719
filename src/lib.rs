//! `postiva-rs` is a typed client for the Postiva scheduling backend.
//!
//! It covers the whole client-side lifecycle of the Postiva dashboard: logging in
//! (password or Google OAuth), linking a TikTok account, submitting videos and
//! photos, polling publish status and reading the account overview.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::error::Error;
//!
//! use postiva_rs::{ContentDraft, MediaFile, Postiva};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn Error>> {
//!     let client = Postiva::new("https://backend.postsiva.com");
//!
//!     let mut auth = client.auth_session();
//!     auth.login("YOUR_EMAIL", "YOUR_PASSWORD").await?;
//!
//!     let clip = MediaFile::from_path("./clip.mp4").await?;
//!
//!     let mut upload = client.post_submission();
//!     let result = upload
//!         .submit(&ContentDraft::video_file(clip, "hello"))
//!         .await?;
//!
//!     println!("Publish ID: {:?}", result.publish_id);
//!
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::nursery)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;
use std::time::Duration;

pub use api::auth::{
    parse_google_callback, AuthError, AuthRequestState, AuthSession, AuthState,
    GoogleAuthStatus, GoogleCallback, GoogleLogin, SignupRequest,
};
pub use api::tiktok::connect::{ConnectError, ConnectOutcome, ConnectState, TikTokConnect};
pub use api::tiktok::overview::{
    FetchVideosBuilder, Overview, OverviewState, UserProfile, VideoPage, VideoSummary,
};
pub use api::tiktok::post::status::{
    PostStatus, PublishStatus, StatusPoller, StatusUpdates, StatusWatch,
    MIN_STATUS_POLL_INTERVAL, STATUS_POLL_INTERVAL,
};
pub use api::tiktok::post::{
    endpoint_for, ContentDraft, DirectPostOptions, FileInfo, Media, MediaFile, MediaKind,
    PhotoSource, PostMode, PostSubmission, PrivacyLevel, SubmissionData, SubmissionEndpoint,
    SubmissionError, SubmissionResult, SubmissionState,
};
pub use api::tiktok::video_detail::{VideoDetail, VideoDetailFetcher, VideoDetailState};
pub use browser::{
    Browser, BrowserEvent, HeadlessBrowser, PopupFeatures, PopupOutcome, WindowGeometry,
};
pub use config::{Config, ConfigError};
pub use error::*;
use reqwest::RequestBuilder;
pub use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
pub use session::{
    clear_auth_data, generate_session_id, JsonFileStore, MemoryStore, Session, SessionStore,
    StorageKey, User,
};

pub(crate) mod api;
pub mod browser;
pub mod config;
mod de;
pub mod error;
pub mod session;

/// Production backend used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://backend.postsiva.com";

/// The envelope every Postiva endpoint wraps its payload in.
///
/// `data` is absent on some failures, and `success` may be `false` even on a
/// `2xx` response when the upstream provider refused the request.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Whether the backend considers the operation successful.
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub success: bool,
    /// Human readable message from the backend.
    #[serde(default, deserialize_with = "crate::de::null_as_default")]
    pub message: String,
    /// Operation specific payload.
    pub data: Option<T>,
}

/// A Postiva client for sending requests to the backend.
///
/// The client is cheap to clone: the HTTP connection pool, the [`SessionStore`]
/// and the [`Browser`] are shared between clones. Every manager
/// ([`AuthSession`], [`TikTokConnect`], [`PostSubmission`], ...) owns its own
/// clone and its own state; the session store is the only state they share.
///
/// The `Debug` implementation does not print the store, which holds the bearer token.
///
/// # Example
/// ```rust,ignore
/// use std::sync::Arc;
/// use postiva_rs::{HeadlessBrowser, JsonFileStore, Postiva};
///
/// let store = JsonFileStore::open("./session.json")?;
///
/// let client = Postiva::new("https://backend.postsiva.com")
///     .with_store(Arc::new(store))
///     .with_browser(Arc::new(HeadlessBrowser::new("http://localhost:3000")));
///
/// let mut auth = client.auth_session();
/// if auth.initialize_auth() {
///     println!("Welcome back {:?}", auth.state().user);
/// }
/// ```
#[derive(Clone)]
pub struct Postiva {
    pub(crate) base_url: String,
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) browser: Arc<dyn Browser>,
    pub(crate) reqwest_client: reqwest::Client,
    pub(crate) status_poll_interval: Duration,
}

impl std::fmt::Debug for Postiva {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Postiva")
            .field("base_url", &self.base_url)
            .field("store", &"***REDACTED***")
            .field("browser", &self.browser.origin())
            .field("reqwest_client", &"Client")
            .field("status_poll_interval", &self.status_poll_interval)
            .finish()
    }
}

impl Postiva {
    /// Creates a new client backed by an in-memory [`MemoryStore`] and a
    /// [`HeadlessBrowser`] rooted at `http://localhost:3000`.
    ///
    /// # Example
    /// ```rust
    /// let client = postiva_rs::Postiva::new("https://backend.postsiva.com");
    /// assert_eq!(client.base_url(), "https://backend.postsiva.com");
    /// ```
    ///
    /// # Panics
    ///
    /// This method will panic if the provided `base_url` is not an `http(s)` URL.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self::new_with_client(base_url, client)
    }

    /// Creates a new client with a custom reqwest client.
    ///
    /// # Panics
    ///
    /// This method will panic if the provided `base_url` is not an `http(s)` URL.
    #[must_use]
    pub fn new_with_client(base_url: &str, client: reqwest::Client) -> Self {
        let trimmed_url = base_url.trim_end_matches('/');
        assert!(
            trimmed_url.starts_with("http://") || trimmed_url.starts_with("https://"),
            "Invalid base_url: must start with http:// or https://"
        );

        Self {
            base_url: trimmed_url.to_string(),
            store: Arc::new(MemoryStore::default()),
            browser: Arc::new(HeadlessBrowser::new(config::DEFAULT_APP_ORIGIN)),
            reqwest_client: client,
            status_poll_interval: STATUS_POLL_INTERVAL,
        }
    }

    /// Builds a client from a validated [`Config`].
    ///
    /// Unlike [`Postiva::new`] this never panics: the URL has already been
    /// checked by the config loader and the HTTP client error is returned.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|error| ConfigError::HttpClient(error.to_string()))?;

        tracing::debug!(
            base_url = %config.api_base_url,
            origin = %config.app_origin,
            "building Postiva client"
        );

        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            store: Arc::new(MemoryStore::default()),
            browser: Arc::new(HeadlessBrowser::new(&config.app_origin)),
            reqwest_client: client,
            status_poll_interval: config.status_poll_interval,
        })
    }

    /// Replaces the session store shared by every manager created afterwards.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = store;
        self
    }

    /// Replaces the browser collaborator used for navigation and popups.
    #[must_use]
    pub fn with_browser(mut self, browser: Arc<dyn Browser>) -> Self {
        self.browser = browser;
        self
    }

    /// Returns the base URL of the Postiva backend.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.base_url.clone()
    }

    /// The shared session store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// The browser collaborator.
    #[must_use]
    pub fn browser(&self) -> &Arc<dyn Browser> {
        &self.browser
    }

    /// Retrieves the stored bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.store.get(StorageKey::AuthToken)
    }

    /// Reads a snapshot of the persisted session.
    #[must_use]
    pub fn session(&self) -> Session {
        Session::load(self.store.as_ref())
    }

    /// Creates an auth manager (login, signup, Google OAuth, logout).
    #[must_use]
    pub fn auth_session(&self) -> AuthSession {
        AuthSession::new(self.clone())
    }

    /// Creates a TikTok account-linking manager.
    #[must_use]
    pub fn tiktok_connect(&self) -> TikTokConnect {
        TikTokConnect::new(self.clone())
    }

    /// Creates a content submission workflow.
    #[must_use]
    pub fn post_submission(&self) -> PostSubmission {
        PostSubmission::new(self.clone())
    }

    /// Creates a single-shot publish status poller.
    #[must_use]
    pub fn status_poller(&self) -> StatusPoller {
        StatusPoller::new(self.clone())
    }

    /// Creates a stopped [`StatusWatch`] using the configured poll interval.
    #[must_use]
    pub fn status_watch(&self) -> StatusWatch {
        StatusWatch::with_interval(self.status_poller(), self.status_poll_interval)
    }

    /// Creates the profile/video-list fetcher.
    #[must_use]
    pub fn overview(&self) -> Overview {
        Overview::new(self.clone())
    }

    /// Creates the single video fetcher.
    #[must_use]
    pub fn video_detail(&self) -> VideoDetailFetcher {
        VideoDetailFetcher::new(self.clone())
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Postiva {
    /// Adds the bearer token and the JSON `Accept` header to the request.
    ///
    /// Signup, login and the Google endpoints pass `None`: they must never carry
    /// a token, even when a previous session is still stored.
    pub(crate) fn with_authorization_token(
        request_builder: RequestBuilder,
        token: Option<&str>,
    ) -> RequestBuilder {
        let request_builder = request_builder.header("Accept", "application/json");

        match token {
            Some(token) => request_builder.bearer_auth(token),
            None => request_builder,
        }
    }

    /// Creates a GET request builder with optional query parameters.
    pub(crate) fn request_get(
        &self,
        endpoint: &str,
        params: Option<Vec<(&str, String)>>,
        token: Option<&str>,
    ) -> RequestBuilder {
        let mut request_builder = self.reqwest_client.get(endpoint);

        if let Some(params) = params {
            request_builder = request_builder.query(&params);
        }

        Self::with_authorization_token(request_builder, token)
    }

    /// Creates a POST request builder with a JSON body.
    pub(crate) fn request_post_json<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &T,
        token: Option<&str>,
    ) -> RequestBuilder {
        let request_builder = self.reqwest_client.post(endpoint).json(body);
        Self::with_authorization_token(request_builder, token)
    }

    /// Creates a POST request builder with a multipart form body.
    pub(crate) fn request_post_form(
        &self,
        endpoint: &str,
        form: Form,
        token: Option<&str>,
    ) -> RequestBuilder {
        let request_builder = self.reqwest_client.post(endpoint).multipart(form);
        Self::with_authorization_token(request_builder, token)
    }

    /// Creates a POST request builder with an `application/x-www-form-urlencoded` body.
    pub(crate) fn request_post_urlencoded<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &T,
        token: Option<&str>,
    ) -> RequestBuilder {
        let request_builder = self.reqwest_client.post(endpoint).form(body);
        Self::with_authorization_token(request_builder, token)
    }
}
