use thiserror::Error;
use tokio::task::JoinHandle;

pub use google::{parse_google_callback, GoogleAuthStatus, GoogleCallback, GoogleLogin};
pub use signup::SignupRequest;

use crate::browser::routes;
use crate::error::{ErrorBody, FetchError};
use crate::session::{self, Session, StorageKey, User};
use crate::Postiva;

pub mod capability;
pub mod google;
pub mod login;
pub mod signup;

/// Represents errors that can occur during login, signup and Google OAuth.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Email and/or password cannot be empty. Nothing was sent.
    #[error("Please enter your email and password.")]
    EmptyField {
        /// Is the email blank.
        email: bool,
        /// Is the password blank.
        password: bool,
    },
    /// The backend refused the credentials or the submitted fields (`4xx`).
    ///
    /// `message` comes from the backend `detail`/`message` field when present.
    #[error("{message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Backend message, or a generic fallback.
        message: String,
    },
    /// The backend failed to process the request (`5xx` or unexpected status).
    #[error("{message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Backend message, or a generic fallback.
        message: String,
    },
    /// The backend answered `2xx` but did not authenticate the user.
    #[error("{0}")]
    Unsuccessful(String),
    /// The OAuth provider reported an error on the callback.
    #[error("{0}")]
    Provider(String),
    /// The OAuth callback carried no authorization code.
    #[error("No authorization code received from Google")]
    MissingCode,
    /// Communication with the backend failed.
    #[error("The communication with the Postiva API failed: {0}")]
    Unreachable(String),
    /// The response could not be parsed into the expected data structure.
    #[error("Could not parse response into the expected data structure: {0}")]
    ParseError(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::ParseError(error.to_string())
        } else {
            Self::Unreachable(error.to_string())
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::ParseError(error.to_string())
    }
}

impl AuthError {
    /// Maps a non-2xx auth response. `fallback` is used when the body carries
    /// neither `detail` nor `message`.
    async fn from_response(response: reqwest::Response, fallback: &str) -> Self {
        let status = response.status();
        let body = ErrorBody::read(response).await;
        let message = body
            .detail_or_message()
            .unwrap_or_else(|| format!("HTTP {}: {fallback}", status.as_u16()));

        if status.is_client_error() {
            Self::Rejected {
                status: status.as_u16(),
                message,
            }
        } else {
            Self::Server {
                status: status.as_u16(),
                message,
            }
        }
    }
}

/// Progress of one auth operation (login, signup or Google login).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthRequestState {
    /// A request is in flight.
    pub is_loading: bool,
    /// Message of the last failure.
    pub error: Option<String>,
    /// The last request succeeded.
    pub is_success: bool,
}

impl AuthRequestState {
    fn begin(&mut self) {
        *self = Self {
            is_loading: true,
            ..Self::default()
        };
    }

    fn finish<T>(&mut self, result: &Result<T, AuthError>) {
        self.is_loading = false;
        match result {
            Ok(_) => self.is_success = true,
            Err(error) => self.error = Some(error.to_string()),
        }
    }

    /// Dismisses the error message.
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Back to the neutral state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// In-memory authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    /// The authenticated user.
    pub user: Option<User>,
    /// The bearer token.
    pub token: Option<String>,
    /// `true` iff both `user` and `token` are present.
    pub is_authenticated: bool,
    /// `true` until [`AuthSession::initialize_auth`] ran.
    pub is_loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            user: None,
            token: None,
            is_authenticated: false,
            is_loading: true,
        }
    }
}

impl AuthState {
    fn from_session(session: Session) -> Self {
        match (session.user, session.token) {
            (Some(user), Some(token)) => Self::authenticated(user, token),
            _ => Self::signed_out(),
        }
    }

    const fn authenticated(user: User, token: String) -> Self {
        Self {
            user: Some(user),
            token: Some(token),
            is_authenticated: true,
            is_loading: false,
        }
    }

    const fn signed_out() -> Self {
        Self {
            user: None,
            token: None,
            is_authenticated: false,
            is_loading: false,
        }
    }
}

/// Auth session manager: login, signup, Google OAuth and logout.
///
/// Created by [`Postiva::auth_session`]. The manager owns its in-memory state;
/// the persisted session lives in the client's [`crate::SessionStore`].
///
/// # Example
/// ```rust,ignore
/// let mut auth = client.auth_session();
///
/// if !auth.initialize_auth() {
///     auth.login("a@x.com", "secret").await?;
/// }
///
/// assert!(auth.state().is_authenticated);
/// ```
#[derive(Debug)]
pub struct AuthSession {
    client: Postiva,
    state: AuthState,
    login: AuthRequestState,
    signup: AuthRequestState,
    google: AuthRequestState,
    google_status: Option<GoogleAuthStatus>,
    capability_probe: Option<JoinHandle<Result<bool, FetchError>>>,
}

impl AuthSession {
    pub(crate) fn new(client: Postiva) -> Self {
        Self {
            client,
            state: AuthState::default(),
            login: AuthRequestState::default(),
            signup: AuthRequestState::default(),
            google: AuthRequestState::default(),
            google_status: None,
            capability_probe: None,
        }
    }

    /// Derives the authentication state from the store, without any request.
    ///
    /// Run it once at start-up, before any route guard decision. Returns
    /// whether a session was restored.
    pub fn initialize_auth(&mut self) -> bool {
        self.state = AuthState::from_session(self.client.session());

        tracing::debug!(
            authenticated = self.state.is_authenticated,
            "auth state initialised from store"
        );

        self.state.is_authenticated
    }

    /// Clears every session key, resets the in-memory state and goes back to
    /// the login route. Calling it twice leaves the store just as empty.
    pub fn logout(&mut self) {
        session::clear_auth_data(self.client.store().as_ref());
        self.state = AuthState::signed_out();

        tracing::info!("logged out");
        self.client.browser().push_route(routes::LOGIN);
    }

    /// The in-memory authentication state.
    #[must_use]
    pub const fn state(&self) -> &AuthState {
        &self.state
    }

    /// Shortcut for `state().is_authenticated`.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.state.is_authenticated
    }

    /// Progress of the last login.
    #[must_use]
    pub const fn login_state(&self) -> &AuthRequestState {
        &self.login
    }

    /// Progress of the last signup.
    #[must_use]
    pub const fn signup_state(&self) -> &AuthRequestState {
        &self.signup
    }

    /// Progress of the last Google operation.
    #[must_use]
    pub const fn google_state(&self) -> &AuthRequestState {
        &self.google
    }

    /// Last result of [`AuthSession::check_google_auth_status`].
    #[must_use]
    pub const fn google_status(&self) -> Option<&GoogleAuthStatus> {
        self.google_status.as_ref()
    }

    /// Dismisses the error of every operation.
    pub fn clear_errors(&mut self) {
        self.login.clear_error();
        self.signup.clear_error();
        self.google.clear_error();
    }

    /// Takes the handle of the capability-flag probe started by the last
    /// successful login, if it was not taken yet.
    ///
    /// The probe never affects the login result; awaiting the handle only
    /// tells whether the cached flag was refreshed.
    pub fn take_capability_probe(&mut self) -> Option<JoinHandle<Result<bool, FetchError>>> {
        self.capability_probe.take()
    }

    /// Installs a new session: session replacement, persistence, in-memory
    /// state, capability probe, then the post-auth route.
    fn install_session(&mut self, token: String, user: User) -> Result<(), AuthError> {
        let store = self.client.store().as_ref();

        session::evict_other_user(store, &user.email);

        let session_id = session::generate_session_id();
        store.set(StorageKey::AuthToken, &token);
        session::persist_user(store, &user, &session_id)?;

        tracing::info!(user_id = %user.id, %session_id, "session installed");

        if let Some(previous) = self.capability_probe.take() {
            previous.abort();
        }
        self.capability_probe = Some(capability::spawn_probe(self.client.clone(), token.clone()));

        self.state = AuthState::authenticated(user, token);
        self.client.browser().push_route(routes::CONNECT);

        Ok(())
    }
}

