pub mod refresh;

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::http::client::ApiClient;
use crate::http::pipeline::RequestOptions;
use crate::models::auth::{
    LoginPayload, LoginResponse, PasswordResetConfirm, PasswordResetRequest, RegisterPayload,
};
use crate::models::user::{UpdateProfile, User};
use crate::notify::{routes, Navigator};
use crate::session::SessionStore;
use crate::token_store::TokenStore;

use self::refresh::RefreshCoordinator;

/// Login, logout, registration and session verification against the HRM
/// auth endpoints. Token and session writes are committed together: a
/// failed call leaves both stores untouched.
pub struct AuthService {
    client: Arc<ApiClient>,
    tokens: Arc<TokenStore>,
    session: Arc<SessionStore>,
    refresher: Arc<RefreshCoordinator>,
    navigator: Arc<dyn Navigator>,
}

impl AuthService {
    pub fn new(
        client: Arc<ApiClient>,
        tokens: Arc<TokenStore>,
        session: Arc<SessionStore>,
        refresher: Arc<RefreshCoordinator>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            client,
            tokens,
            session,
            refresher,
            navigator,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.current_user()
    }

    pub async fn login(&self, payload: &LoginPayload) -> Result<User, ApiError> {
        let response: LoginResponse = self
            .client
            .post_with_options("/auth/login", payload, &RequestOptions::auth_endpoint())
            .await?;
        self.commit(response)
    }

    pub async fn register(&self, payload: &RegisterPayload) -> Result<User, ApiError> {
        let response: LoginResponse = self
            .client
            .post_with_options("/auth/register", payload, &RequestOptions::auth_endpoint())
            .await?;
        self.commit(response)
    }

    fn commit(&self, response: LoginResponse) -> Result<User, ApiError> {
        self.tokens.set_tokens(
            &response.access_token,
            &response.refresh_token,
            response.expires_in,
        );
        self.session.set_user(Some(response.user.clone()));
        info!(user_id = %response.user.id, "signed in");
        Ok(response.user)
    }

    /// Best-effort server-side revocation followed by unconditional local
    /// teardown. The user always ends up signed out, server reachable or
    /// not.
    pub async fn logout(&self) {
        let result = self
            .client
            .post_empty_with_options("/auth/logout", &json!({}), &RequestOptions::best_effort())
            .await;
        if let Err(err) = result {
            warn!(error = %err, "logout revocation failed; clearing local state anyway");
        }
        self.logout_local();
    }

    /// Local teardown only: clears tokens and session, redirects to login.
    pub fn logout_local(&self) {
        self.tokens.clear();
        self.session.clear();
        self.navigator.navigate(routes::LOGIN);
    }

    /// Forces a token refresh through the single-flight coordinator and
    /// returns the new access token.
    pub async fn refresh_token(&self) -> Result<String, ApiError> {
        self.refresher.refresh().await
    }

    /// Confirms the persisted session against the server. Returns
    /// `Ok(None)` quietly when there is nothing worth verifying (no valid
    /// token or no hydrated user); a server-side rejection tears down and
    /// redirects to login.
    pub async fn verify_session(&self) -> Result<Option<User>, ApiError> {
        if !self.tokens.is_token_valid() || !self.session.is_authenticated() {
            self.tokens.clear();
            self.session.clear();
            return Ok(None);
        }

        match self.client.get::<User>("/auth/me").await {
            Ok(user) => {
                self.session.set_user(Some(user.clone()));
                Ok(Some(user))
            }
            Err(err) => {
                warn!(error = %err, "session verification failed");
                self.tokens.clear();
                self.session.clear();
                self.navigator.navigate(routes::LOGIN);
                Err(err)
            }
        }
    }

    pub async fn update_profile(&self, update: &UpdateProfile) -> Result<User, ApiError> {
        let user: User = self.client.put("/auth/profile", update).await?;
        self.session.set_user(Some(user.clone()));
        Ok(user)
    }

    pub async fn request_password_reset(
        &self,
        request: &PasswordResetRequest,
    ) -> Result<(), ApiError> {
        self.client
            .post_empty_with_options(
                "/auth/password-reset",
                request,
                &RequestOptions::auth_endpoint(),
            )
            .await
    }

    pub async fn confirm_password_reset(
        &self,
        confirm: &PasswordResetConfirm,
    ) -> Result<(), ApiError> {
        self.client
            .post_empty_with_options(
                "/auth/password-reset/confirm",
                confirm,
                &RequestOptions::auth_endpoint(),
            )
            .await
    }
}
