use serde::Serialize;

use super::{AuthError, AuthSession, AuthState};
use crate::browser::routes;
use crate::session::{self, User};

const SIGNUP_PATH: &str = "/auth/signup";

/// Fields of the signup form.
#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    /// Email address.
    pub email: String,
    /// Public username.
    pub username: String,
    /// Display name.
    pub full_name: String,
    /// Password.
    pub password: String,
}

impl AuthSession {
    /// Create an account.
    ///
    /// Signup does not authenticate: any previous session is cleared, the new
    /// user snapshot is stored without a token and the browser moves to the
    /// login route.
    ///
    /// # Example
    /// ```rust,ignore
    /// let user = auth
    ///     .signup(&SignupRequest {
    ///         email: "a@x.com".to_string(),
    ///         username: "alice".to_string(),
    ///         full_name: "Alice".to_string(),
    ///         password: "secret".to_string(),
    ///     })
    ///     .await?;
    /// ```
    pub async fn signup(&mut self, request: &SignupRequest) -> Result<User, AuthError> {
        self.signup.begin();

        let result = self.perform_signup(request).await;

        if let Err(error) = &result {
            tracing::error!(%error, "signup failed");
        }
        self.signup.finish(&result);

        result
    }

    async fn perform_signup(&mut self, request: &SignupRequest) -> Result<User, AuthError> {
        let url = self.client.endpoint(SIGNUP_PATH);

        let response = self
            .client
            .request_post_json(&url, request, None)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::from_response(response, "Signup failed").await);
        }

        let user = response.json::<User>().await?;

        let store = self.client.store().as_ref();
        session::clear_auth_data(store);

        let session_id = session::generate_session_id();
        session::persist_user(store, &user, &session_id)?;

        self.state = AuthState::signed_out();

        tracing::info!(user_id = %user.id, %session_id, "signup successful");
        self.client.browser().push_route(routes::LOGIN);

        Ok(user)
    }
}
