use std::sync::Arc;

use crate::config::{ClientConfig, ConfigError};
use crate::fallback::FallbackHandler;
use crate::http::client::ApiClient;
use crate::http::loading::LoadingTracker;
use crate::http::pipeline::HttpPipeline;
use crate::notify::{Navigator, NoopNavigator, Notifier, TracingNotifier};
use crate::services::auth::refresh::RefreshCoordinator;
use crate::services::auth::AuthService;
use crate::session::SessionStore;
use crate::storage::{FileStorage, KeyValueStorage, MemoryStorage};
use crate::token_store::TokenStore;

/// Fully wired client. Cheap to clone; every clone shares the same stores,
/// pipeline and coordinator.
#[derive(Clone)]
pub struct ClientState {
    pub config: Arc<ClientConfig>,
    pub tokens: Arc<TokenStore>,
    pub session: Arc<SessionStore>,
    pub client: Arc<ApiClient>,
    pub auth: Arc<AuthService>,
    pub fallback: Arc<FallbackHandler>,
    pub loading: LoadingTracker,
}

impl ClientState {
    pub fn new(
        config: ClientConfig,
        storage: Arc<dyn KeyValueStorage>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let config = Arc::new(config);
        let tokens = Arc::new(TokenStore::new(storage.clone()));
        let session = Arc::new(SessionStore::new(storage));
        let loading = LoadingTracker::new();

        let http = reqwest::Client::new();
        let refresher = Arc::new(RefreshCoordinator::new(
            http.clone(),
            config.clone(),
            tokens.clone(),
            session.clone(),
        ));
        let pipeline = Arc::new(HttpPipeline::new(
            http,
            config.clone(),
            tokens.clone(),
            refresher.clone(),
            loading.clone(),
            notifier.clone(),
            navigator.clone(),
        ));
        let client = Arc::new(ApiClient::new(pipeline, config.clone()));
        let auth = Arc::new(AuthService::new(
            client.clone(),
            tokens.clone(),
            session.clone(),
            refresher,
            navigator.clone(),
        ));
        let fallback = Arc::new(FallbackHandler::new(notifier, navigator));

        Self {
            config,
            tokens,
            session,
            client,
            auth,
            fallback,
            loading,
        }
    }

    /// Builds a client from environment configuration with the default
    /// sinks: file-backed storage when `HRM_STORAGE_PATH` is set, log-only
    /// notifications, no-op navigation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = ClientConfig::from_env()?;
        let storage: Arc<dyn KeyValueStorage> = match &config.storage_path {
            Some(path) => Arc::new(FileStorage::open(path.clone())),
            None => Arc::new(MemoryStorage::default()),
        };
        Ok(Self::new(
            config,
            storage,
            Arc::new(TracingNotifier),
            Arc::new(NoopNavigator),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{RecordingNavigator, RecordingNotifier};

    fn state() -> ClientState {
        ClientState::new(
            ClientConfig::new("https://hrm.example.com/api"),
            Arc::new(MemoryStorage::default()),
            Arc::new(RecordingNotifier::default()),
            Arc::new(RecordingNavigator::default()),
        )
    }

    #[test]
    fn clones_share_the_same_stores() {
        let state = state();
        let clone = state.clone();

        state.tokens.set_tokens("access", "refresh", 3600);
        assert_eq!(clone.tokens.access_token().as_deref(), Some("access"));

        let _guard = state.loading.start();
        assert!(clone.loading.is_loading());
    }

    #[test]
    fn fresh_state_is_signed_out() {
        let state = state();
        assert!(!state.auth.is_authenticated());
        assert!(!state.tokens.is_token_valid());
        assert!(!state.loading.is_loading());
    }
}
