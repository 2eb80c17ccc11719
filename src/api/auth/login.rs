use serde::{Deserialize, Serialize};

use super::{AuthError, AuthSession};
use crate::session::User;

const LOGIN_PATH: &str = "/auth/login";

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
    user: User,
}

impl AuthSession {
    /// Authenticate with **email** and **password**.
    ///
    /// On success the previous session is replaced when it belongs to another
    /// email, the token and user are persisted, the capability flag is probed
    /// in the background and the browser moves to the connect route.
    ///
    /// The failure is also recorded in [`AuthSession::login_state`].
    ///
    /// # Example
    /// ```rust,ignore
    /// let user = auth.login("a@x.com", "secret").await?;
    ///
    /// println!("Welcome {}", user.full_name);
    /// ```
    pub async fn login(&mut self, email: &str, password: &str) -> Result<User, AuthError> {
        self.login.begin();

        let result = self.perform_login(email, password).await;

        if let Err(error) = &result {
            tracing::error!(%error, "login failed");
        }
        self.login.finish(&result);

        result
    }

    async fn perform_login(&mut self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = email.trim();

        if email.is_empty() || password.is_empty() {
            return Err(AuthError::EmptyField {
                email: email.is_empty(),
                password: password.is_empty(),
            });
        }

        let url = self.client.endpoint(LOGIN_PATH);
        let credentials = Credentials { email, password };

        let response = self
            .client
            .request_post_json(&url, &credentials, None)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::from_response(response, "Login failed").await);
        }

        let login = response.json::<LoginResponse>().await?;

        self.install_session(login.access_token, login.user.clone())?;

        tracing::info!(email = %login.user.email, "login successful");

        Ok(login.user)
    }
}
