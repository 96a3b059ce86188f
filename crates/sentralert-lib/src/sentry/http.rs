//! Authenticated HTTP access to the Sentry API

use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use url::Url;

use crate::config::SentrySettings;
use crate::error::{AlertError, Result};
use crate::oracle::with_trailing_slash;

/// Thin JSON client over the Sentry REST API
pub(crate) struct SentryHttp {
    client: Client,
    base_url: Url,
    auth_token: String,
}

impl SentryHttp {
    pub(crate) fn new(settings: &SentrySettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AlertError::InvalidConfig(format!("failed to create HTTP client: {e}")))?;

        let base_url = Url::parse(&with_trailing_slash(&settings.api_url))
            .map_err(|e| AlertError::InvalidConfig(format!("invalid Sentry API URL: {e}")))?;

        Ok(Self {
            client,
            base_url,
            auth_token: settings.auth_token.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| AlertError::InvalidConfig(format!("invalid API path {path}: {e}")))?;
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(&self.auth_token))
    }

    /// GET with query parameters
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let request = self.request(Method::GET, path)?.query(query);
        self.execute(path, request).await
    }

    /// POST a JSON body
    pub(crate) async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let request = self.request(Method::POST, path)?.json(body);
        self.execute(path, request).await
    }

    /// PUT a JSON body
    pub(crate) async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let request = self.request(Method::PUT, path)?.json(body);
        self.execute(path, request).await
    }

    async fn execute<T: DeserializeOwned>(&self, path: &str, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(|source| AlertError::Transport {
            endpoint: path.to_string(),
            source,
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AlertError::Request {
                endpoint: path.to_string(),
                status,
                body,
            });
        }

        response.json().await.map_err(|source| AlertError::Transport {
            endpoint: path.to_string(),
            source,
        })
    }
}
