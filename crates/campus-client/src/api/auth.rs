//! Authentication API.

use reqwest::Method;

use crate::client::CampusClient;
use crate::error::Result;
use crate::request::RequestOptions;
use crate::session::UserSummary;
use crate::types::{AuthResponse, LoginRequest, RegisterRequest};

/// Authentication API client.
///
/// Login and registration bypass token renewal: a 401 there means the
/// credentials are wrong, not that a session expired.
pub struct AuthApi {
    client: CampusClient,
}

impl AuthApi {
    pub(crate) fn new(client: CampusClient) -> Self {
        Self { client }
    }

    /// Sign in and start a new session.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.authenticate("auth/login", &request).await
    }

    /// Create an account and start a new session.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse> {
        self.authenticate("auth/register", request).await
    }

    async fn authenticate<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<AuthResponse> {
        let options = RequestOptions::new().json(body)?.without_renewal();
        let response = self.client.request(Method::POST, path, options).await?;
        let auth: AuthResponse = response.json().await?;

        self.client.session().start(
            &auth.access_token,
            auth.refresh_token.as_deref(),
            auth.user.as_ref(),
        )?;
        Ok(auth)
    }

    /// Fetch the signed-in user and refresh the cached copy.
    pub async fn me(&self) -> Result<UserSummary> {
        let user: UserSummary = self.client.get("auth/me").await?;
        self.client.session().set_user(&user)?;
        Ok(user)
    }

    /// End the session.
    ///
    /// The backend is told best-effort; the local session is cleared even if
    /// that call fails.
    pub async fn logout(&self) -> Result<()> {
        if self.client.session().is_authenticated() {
            let options = RequestOptions::new().without_renewal().silent();
            if let Err(e) = self.client.request(Method::POST, "auth/logout", options).await {
                tracing::debug!("Backend logout failed, clearing local session anyway: {}", e);
            }
        }
        self.client.session().clear()
    }
}
