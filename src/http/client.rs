use std::sync::Arc;

use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{join_url, retry::RetryPolicy};
use crate::responses::{ApiEnvelope, PageQuery, PageResult, PaginatedEnvelope};

use super::pipeline::{HttpPipeline, RequestOptions};

/// Typed request helpers layered above the pipeline. Every response is
/// expected to arrive in the standard `{success, data, message}` envelope;
/// `success: false` becomes an error carrying the server message.
pub struct ApiClient {
    pipeline: Arc<HttpPipeline>,
    config: Arc<ClientConfig>,
}

impl ApiClient {
    pub fn new(pipeline: Arc<HttpPipeline>, config: Arc<ClientConfig>) -> Self {
        Self { pipeline, config }
    }

    pub fn pipeline(&self) -> &Arc<HttpPipeline> {
        &self.pipeline
    }

    /// Absolute URLs pass through unchanged; relative paths are joined
    /// onto the configured base URL and version segment.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            join_url(&self.config.api_base_url, &self.config.api_version, path)
        }
    }

    fn idempotent_options(&self) -> RequestOptions {
        RequestOptions::idempotent(RetryPolicy::from_config(&self.config))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .pipeline
            .execute(
                Method::GET,
                &self.url(path),
                &[],
                None,
                &self.idempotent_options(),
            )
            .await?;
        Self::unwrap_data(response).await
    }

    pub async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        self.get(path).await
    }

    pub async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        page: &PageQuery,
    ) -> Result<PageResult<T>, ApiError> {
        let response = self
            .pipeline
            .execute(
                Method::GET,
                &self.url(path),
                &page.to_query_params(),
                None,
                &self.idempotent_options(),
            )
            .await?;
        Self::unwrap_page(response).await
    }

    /// Paginated search with a free-form filter map. Null filter values are
    /// omitted from the query string entirely.
    pub async fn search<T: DeserializeOwned>(
        &self,
        path: &str,
        page: &PageQuery,
        filters: &serde_json::Map<String, Value>,
    ) -> Result<PageResult<T>, ApiError> {
        let mut params = page.to_query_params();
        for (key, value) in filters {
            match value {
                Value::Null => continue,
                Value::String(s) => params.push((key.clone(), s.clone())),
                other => params.push((key.clone(), other.to_string())),
            }
        }

        let response = self
            .pipeline
            .execute(
                Method::GET,
                &self.url(path),
                &params,
                None,
                &self.idempotent_options(),
            )
            .await?;
        Self::unwrap_page(response).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        self.post_with_options(path, body, &RequestOptions::mutating())
            .await
    }

    pub async fn post_with_options<T, B>(
        &self,
        path: &str,
        body: &B,
        options: &RequestOptions,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let body = Self::to_body(body)?;
        let response = self
            .pipeline
            .execute(Method::POST, &self.url(path), &[], Some(&body), options)
            .await?;
        Self::unwrap_data(response).await
    }

    /// POST for endpoints whose envelope carries no data payload.
    pub async fn post_empty_with_options<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        options: &RequestOptions,
    ) -> Result<(), ApiError> {
        let body = Self::to_body(body)?;
        let response = self
            .pipeline
            .execute(Method::POST, &self.url(path), &[], Some(&body), options)
            .await?;
        Self::unwrap_empty(response).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let body = Self::to_body(body)?;
        let response = self
            .pipeline
            .execute(
                Method::PUT,
                &self.url(path),
                &[],
                Some(&body),
                &RequestOptions::mutating(),
            )
            .await?;
        Self::unwrap_data(response).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        let body = Self::to_body(body)?;
        let response = self
            .pipeline
            .execute(
                Method::PATCH,
                &self.url(path),
                &[],
                Some(&body),
                &RequestOptions::mutating(),
            )
            .await?;
        Self::unwrap_data(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let response = self
            .pipeline
            .execute(
                Method::DELETE,
                &self.url(path),
                &[],
                None,
                &RequestOptions::mutating(),
            )
            .await?;
        Self::unwrap_empty(response).await
    }

    /// DELETE that returns the removed/affected resource.
    pub async fn delete_with_response<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ApiError> {
        let response = self
            .pipeline
            .execute(
                Method::DELETE,
                &self.url(path),
                &[],
                None,
                &RequestOptions::mutating(),
            )
            .await?;
        Self::unwrap_data(response).await
    }

    fn to_body<B: Serialize>(body: &B) -> Result<Value, ApiError> {
        serde_json::to_value(body)
            .map_err(|err| ApiError::runtime(format!("Failed to serialize request body: {err}")))
    }

    async fn unwrap_data<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|err| ApiError::unknown(format!("Malformed response envelope: {err}")))?;

        if !envelope.success {
            return Err(ApiError::business(
                envelope
                    .message
                    .unwrap_or_else(|| "Request rejected by server".to_string()),
            ));
        }

        envelope
            .data
            .ok_or_else(|| ApiError::unknown("Response envelope missing data"))
    }

    async fn unwrap_empty(response: Response) -> Result<(), ApiError> {
        let envelope: ApiEnvelope<Value> = response
            .json()
            .await
            .map_err(|err| ApiError::unknown(format!("Malformed response envelope: {err}")))?;

        if !envelope.success {
            return Err(ApiError::business(
                envelope
                    .message
                    .unwrap_or_else(|| "Request rejected by server".to_string()),
            ));
        }
        Ok(())
    }

    async fn unwrap_page<T: DeserializeOwned>(response: Response) -> Result<PageResult<T>, ApiError> {
        let envelope: PaginatedEnvelope<T> = response
            .json()
            .await
            .map_err(|err| ApiError::unknown(format!("Malformed paginated envelope: {err}")))?;

        if !envelope.success {
            return Err(ApiError::business(
                envelope
                    .message
                    .unwrap_or_else(|| "Request rejected by server".to_string()),
            ));
        }

        Ok(PageResult {
            items: envelope.data,
            pagination: envelope.pagination,
        })
    }
}
