use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::join_url;
use crate::models::auth::TokenPair;
use crate::responses::ApiEnvelope;
use crate::session::SessionStore;
use crate::token_store::TokenStore;

/// Single-flight token refresh. Any number of callers hitting 401 at the
/// same time coalesce onto one wire call: the first caller through the lock
/// performs the exchange and bumps the generation; everyone queued behind
/// it observes the bumped generation and reuses the stored token. A failed
/// exchange tears down tokens and session locally (no network, no recursive
/// 401) and every waiter fails together.
pub struct RefreshCoordinator {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    tokens: Arc<TokenStore>,
    session: Arc<SessionStore>,
    lock: Mutex<()>,
    generation: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        http: reqwest::Client,
        config: Arc<ClientConfig>,
        tokens: Arc<TokenStore>,
        session: Arc<SessionStore>,
    ) -> Self {
        Self {
            http,
            config,
            tokens,
            session,
            lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Exchanges the refresh token for a new pair and returns the new
    /// access token. Concurrent callers receive the same outcome.
    pub async fn refresh(&self) -> Result<String, ApiError> {
        let seen = self.generation.load(Ordering::Acquire);
        let _guard = self.lock.lock().await;

        if self.generation.load(Ordering::Acquire) != seen {
            // Someone else refreshed while we waited; reuse their result.
            return match self.tokens.access_token() {
                Some(token) => {
                    debug!("coalesced onto a completed refresh");
                    Ok(token)
                }
                None => Err(ApiError::authentication("Session expired")),
            };
        }

        let Some(refresh_token) = self.tokens.refresh_token() else {
            self.teardown();
            return Err(ApiError::authentication("No refresh token available"));
        };

        match self.exchange(&refresh_token).await {
            Ok(pair) => {
                self.tokens
                    .set_tokens(&pair.access_token, &pair.refresh_token, pair.expires_in);
                self.generation.fetch_add(1, Ordering::Release);
                debug!("access token refreshed");
                Ok(pair.access_token)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed, tearing down auth state");
                self.teardown();
                Err(err)
            }
        }
    }

    fn teardown(&self) {
        self.tokens.clear();
        self.session.clear();
    }

    async fn exchange(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let url = join_url(
            &self.config.api_base_url,
            &self.config.api_version,
            "/auth/refresh",
        );

        let response = self
            .http
            .post(&url)
            .timeout(self.config.request_timeout)
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ApiEnvelope<serde_json::Value>>()
                .await
                .ok()
                .and_then(|envelope| envelope.message);
            return Err(ApiError::from_status(status.as_u16(), message));
        }

        let envelope: ApiEnvelope<TokenPair> = response
            .json()
            .await
            .map_err(|err| ApiError::unknown(format!("Malformed refresh response: {err}")))?;

        if !envelope.success {
            return Err(ApiError::authentication(
                envelope
                    .message
                    .unwrap_or_else(|| "Token refresh rejected".to_string()),
            ));
        }

        envelope
            .data
            .ok_or_else(|| ApiError::unknown("Refresh response missing token data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use httpmock::prelude::*;

    fn coordinator_for(server: &MockServer) -> (Arc<RefreshCoordinator>, Arc<TokenStore>) {
        let storage = Arc::new(MemoryStorage::default());
        let tokens = Arc::new(TokenStore::new(storage.clone()));
        let session = Arc::new(SessionStore::new(storage));
        let config = Arc::new(ClientConfig::new(format!("{}/api", server.base_url())));
        let coordinator = Arc::new(RefreshCoordinator::new(
            reqwest::Client::new(),
            config,
            tokens.clone(),
            session,
        ));
        (coordinator, tokens)
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_wire_refresh() {
        let server = MockServer::start();
        let refresh_mock = server
            .mock(|when, then| {
                when.method(POST)
                    .path("/api/v1/auth/refresh")
                    .json_body(json!({ "refreshToken": "refresh-0" }));
                then.status(200).json_body(json!({
                    "success": true,
                    "data": {
                        "accessToken": "access-1",
                        "refreshToken": "refresh-1",
                        "expiresIn": 900
                    }
                }));
            });

        let (coordinator, tokens) = coordinator_for(&server);
        tokens.set_tokens("access-0", "refresh-0", -10);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coordinator = Arc::clone(&coordinator);
            handles.push(tokio::spawn(async move { coordinator.refresh().await }));
        }
        for handle in handles {
            let token = handle.await.expect("task ok").expect("refresh ok");
            assert_eq!(token, "access-1");
        }

        assert_eq!(refresh_mock.hits(), 1);
        assert_eq!(tokens.refresh_token().as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn failed_refresh_tears_down_and_fails_all_waiters() {
        let server = MockServer::start();
        let refresh_mock = server
            .mock(|when, then| {
                when.method(POST).path("/api/v1/auth/refresh");
                then.status(401).json_body(json!({
                    "success": false,
                    "message": "Refresh token revoked"
                }));
            });

        let (coordinator, tokens) = coordinator_for(&server);
        tokens.set_tokens("access-0", "refresh-0", -10);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let coordinator = Arc::clone(&coordinator);
            handles.push(tokio::spawn(async move { coordinator.refresh().await }));
        }
        for handle in handles {
            let err = handle.await.expect("task ok").expect_err("refresh fails");
            assert_eq!(err.kind, crate::error::ErrorKind::Authentication);
        }

        // one wire call; the rest failed locally off the cleared state
        assert_eq!(refresh_mock.hits(), 1);
        assert!(tokens.access_token().is_none());
        assert!(tokens.refresh_token().is_none());
    }

    #[tokio::test]
    async fn refresh_without_a_refresh_token_fails_fast() {
        let server = MockServer::start();
        let (coordinator, _tokens) = coordinator_for(&server);

        let err = coordinator.refresh().await.expect_err("no token");
        assert_eq!(err.kind, crate::error::ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn envelope_level_rejection_is_authentication() {
        let server = MockServer::start();
        server
            .mock(|when, then| {
                when.method(POST).path("/api/v1/auth/refresh");
                then.status(200)
                    .json_body(json!({ "success": false, "message": "nope" }));
            });

        let (coordinator, tokens) = coordinator_for(&server);
        tokens.set_tokens("access-0", "refresh-0", -10);

        let err = coordinator.refresh().await.expect_err("rejected");
        assert_eq!(err.kind, crate::error::ErrorKind::Authentication);
        assert_eq!(err.message, "nope");
        assert!(tokens.access_token().is_none());
    }
}
