//! HTTP client helper for exchange REST APIs
//!
//! Single-shot: a failed request surfaces as a [`FetcherError`] and
//! aborts the job; the next run resumes from the store.

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

use crate::fetcher::{FetcherError, FetcherResult};

/// JSON-over-HTTP client bound to one exchange base URL
pub struct ExchangeHttpClient {
    client: Arc<Client>,
    base_url: String,
}

impl ExchangeHttpClient {
    /// Create a client
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client
    /// * `base_url` - Base URL for API endpoints (e.g., "<https://www.bitmex.com>")
    pub fn new(client: Arc<Client>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Base URL of the exchange API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execute a GET request and deserialize the JSON body
    ///
    /// # Errors
    /// Returns FetcherError on network, status, or parse errors
    pub async fn get<T>(&self, endpoint: &str, params: &[(&str, String)]) -> FetcherResult<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("Making GET request to: {} with {} params", url, params.len());

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| FetcherError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_status(status.as_u16(), &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetcherError::ParseError(format!("Failed to deserialize response: {e}")))
    }
}

/// Map a non-success status to the matching error
pub fn classify_status(status: u16, body: &str) -> FetcherError {
    match status {
        429 | 418 => FetcherError::RateLimitExceeded,
        500..=599 => FetcherError::HttpError(format!("Server error {status}: {body}")),
        _ => FetcherError::ApiError(format!("Client error {status}: {body}")),
    }
}
