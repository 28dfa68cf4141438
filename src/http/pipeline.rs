use std::sync::Arc;

use reqwest::{Method, Response};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::ClientConfig;
use crate::error::{ApiError, ErrorKind};
use crate::http::{is_auth_exempt, is_refresh_endpoint, retry::RetryPolicy};
use crate::notify::{routes, Navigator, Notifier, Severity};
use crate::responses::ApiEnvelope;
use crate::services::auth::refresh::RefreshCoordinator;
use crate::token_store::TokenStore;

use super::loading::LoadingTracker;

/// Per-request knobs for the interceptor chain. The typed client picks the
/// right preset per verb; callers rarely touch these directly.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Never attach a bearer token, regardless of path.
    pub skip_auth: bool,
    /// Leave the global loading counter alone for this request.
    pub skip_loading: bool,
    /// Attempt one refresh-and-retry when the response is 401.
    pub retry_on_unauthorized: bool,
    /// Transport retry policy. Only GET-family requests carry a real one.
    pub retry: RetryPolicy,
}

impl RequestOptions {
    /// GET-family preset: transport retries on, 401 retry on.
    pub fn idempotent(retry: RetryPolicy) -> Self {
        Self {
            skip_auth: false,
            skip_loading: false,
            retry_on_unauthorized: true,
            retry,
        }
    }

    /// POST/PUT/PATCH/DELETE preset: no transport retries, 401 retry on.
    pub fn mutating() -> Self {
        Self {
            skip_auth: false,
            skip_loading: false,
            retry_on_unauthorized: true,
            retry: RetryPolicy::none(),
        }
    }

    /// Login/register/password-reset preset: anonymous, no 401 retry.
    pub fn auth_endpoint() -> Self {
        Self {
            skip_auth: true,
            skip_loading: false,
            retry_on_unauthorized: false,
            retry: RetryPolicy::none(),
        }
    }

    /// Fire-and-forget variant that must not recurse into auth handling
    /// (used by logout).
    pub fn best_effort() -> Self {
        Self {
            skip_auth: false,
            skip_loading: false,
            retry_on_unauthorized: false,
            retry: RetryPolicy::none(),
        }
    }

    pub fn without_loading(mut self) -> Self {
        self.skip_loading = true;
        self
    }
}

/// Ordered interceptor chain applied to every outgoing request:
/// auth-attach, loading tracking, 401 refresh-and-retry-once, error
/// classification. Transport retries wrap the whole chain for idempotent
/// requests.
pub struct HttpPipeline {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
    tokens: Arc<TokenStore>,
    refresher: Arc<RefreshCoordinator>,
    loading: LoadingTracker,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
}

impl HttpPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        http: reqwest::Client,
        config: Arc<ClientConfig>,
        tokens: Arc<TokenStore>,
        refresher: Arc<RefreshCoordinator>,
        loading: LoadingTracker,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            http,
            config,
            tokens,
            refresher,
            loading,
            notifier,
            navigator,
        }
    }

    pub fn loading(&self) -> &LoadingTracker {
        &self.loading
    }

    /// Runs one logical request through the chain. Returns the raw
    /// response on 2xx; anything else comes back as a classified
    /// [`ApiError`] that has already been logged and, where appropriate,
    /// notified.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<Response, ApiError> {
        let _loading = (!options.skip_loading && !is_refresh_endpoint(url))
            .then(|| self.loading.start());

        let mut attempt: u32 = 0;
        loop {
            match self.dispatch(method.clone(), url, query, body, options).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt + 1 < options.retry.max_attempts => {
                    let delay = options.retry.delay_for(attempt);
                    warn!(
                        %url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transient failure: {}",
                        err.message
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(mut err) => {
                    // Status-derived errors were already reported by finish();
                    // transport failures reach this point unlogged.
                    if matches!(err.kind, ErrorKind::Network | ErrorKind::Timeout) {
                        self.report(&mut err);
                    }
                    return Err(err);
                }
            }
        }
    }

    /// One attempt: send, and on 401 from a non-exempt endpoint, refresh
    /// once and re-issue the original request with the new token. Never
    /// more than one re-issue per original request.
    async fn dispatch(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<Response, ApiError> {
        let response = self
            .send_once(method.clone(), url, query, body, options, None)
            .await?;

        if response.status().as_u16() == 401
            && options.retry_on_unauthorized
            && !is_auth_exempt(url)
        {
            match self.refresher.refresh().await {
                Ok(new_token) => {
                    debug!(%url, "re-issuing request with refreshed token");
                    let retried = self
                        .send_once(method, url, query, body, options, Some(new_token))
                        .await?;
                    return self.finish(retried).await;
                }
                Err(refresh_err) => {
                    warn!(%url, error = %refresh_err, "refresh failed; abandoning request");
                    // coordinator already tore local auth state down
                    self.navigator.navigate(routes::LOGIN);
                    return self.finish(response).await;
                }
            }
        }

        self.finish(response).await
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        options: &RequestOptions,
        token_override: Option<String>,
    ) -> Result<Response, ApiError> {
        let mut request = self
            .http
            .request(method, url)
            .timeout(self.config.request_timeout);

        if !query.is_empty() {
            request = request.query(query);
        }

        let token = match token_override {
            Some(token) => Some(token),
            None if !options.skip_auth && !is_auth_exempt(url) => self.tokens.access_token(),
            None => None,
        };
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().await.map_err(ApiError::from_transport)
    }

    /// Error-classification stage: non-success statuses become structured
    /// errors; every one is logged, a subset notifies the user, and 403
    /// additionally navigates to the access-denied view.
    async fn finish(&self, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let server_message = Self::read_error_message(response).await;
        let mut err = ApiError::from_status(status.as_u16(), server_message);
        self.report(&mut err);
        Err(err)
    }

    async fn read_error_message(response: Response) -> Option<String> {
        let text = response.text().await.ok()?;
        serde_json::from_str::<ApiEnvelope<Value>>(&text)
            .ok()
            .and_then(|envelope| envelope.message)
    }

    fn report(&self, err: &mut ApiError) {
        error!(kind = ?err.kind, status = err.status, "{}", err.message);
        match err.kind {
            ErrorKind::Authorization => {
                self.navigator.navigate(routes::ACCESS_DENIED);
            }
            ErrorKind::RateLimited => {
                self.notifier.notify(Severity::Warning, &err.message);
                err.mark_notified();
            }
            ErrorKind::Http if err.status.is_some_and(|s| s >= 500) => {
                self.notifier.notify(Severity::Error, &err.message);
                err.mark_notified();
            }
            _ => {}
        }
    }
}
