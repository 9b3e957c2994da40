use std::time::Duration;

use catrec_core::config::RetryConfig;
use catrec_core::error::{CatrecError, FetchError, ParseError};
use catrec_core::models::credentials::BasicCredentials;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// How many times to try a request and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try and is clamped to at least 1.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Policy for cheap total-count queries.
    pub fn for_counts(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.delay())
    }

    /// Policy for identifier list queries.
    pub fn for_lists(config: &RetryConfig) -> Self {
        Self::new(config.list_max_attempts, config.delay())
    }

}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::for_counts(&RetryConfig::default())
    }
}

/// HTTP GET with bounded retries. Cheap to clone.
///
/// Fails open: once the attempts are used up it returns
/// [`FetchError::Exhausted`] instead of the transport error, and adapters
/// turn that into an empty result marked degraded. A chunk whose catalog was
/// unreachable still produces a record, and only its status tells it apart
/// from a chunk that truly has no products.
#[derive(Debug, Clone)]
pub struct RetryingFetcher {
    client: reqwest::Client,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl RetryingFetcher {
    pub fn new(
        policy: RetryPolicy,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<Self, CatrecError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("catrec/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CatrecError::Config {
                message: format!("failed to build http client: {e}"),
            })?;
        Ok(Self {
            client,
            policy,
            cancel,
        })
    }

    /// Same client and cancellation, different retry policy.
    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            client: self.client.clone(),
            policy,
            cancel: self.cancel.clone(),
        }
    }

    /// Fetch a response body.
    pub async fn fetch(
        &self,
        url: &Url,
        credentials: Option<&BasicCredentials>,
    ) -> Result<String, FetchError> {
        self.fetch_parsed(url, credentials, |body| Ok(body.to_string()))
            .await
    }

    /// Fetch a body and extract a value from it. A [`ParseError`] from
    /// `parse` counts as a failed attempt and is retried.
    pub async fn fetch_parsed<T, F>(
        &self,
        url: &Url,
        credentials: Option<&BasicCredentials>,
        parse: F,
    ) -> Result<T, FetchError>
    where
        F: Fn(&str) -> Result<T, ParseError>,
    {
        let max_attempts = self.policy.max_attempts;
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Err(FetchError::Cancelled { url: url.to_string() });
                }
                outcome = self.attempt(url, credentials) => outcome,
            };

            let error = match outcome {
                Ok(body) => match parse(&body) {
                    Ok(value) => {
                        debug!(%url, attempt, "catalog request succeeded");
                        return Ok(value);
                    }
                    Err(e) => FetchError::Transient {
                        url: url.to_string(),
                        message: e.to_string(),
                    },
                },
                Err(e) => e,
            };

            warn!(%url, attempt, max_attempts, error = %error, "catalog request failed");
            last_error = error.to_string();

            if attempt < max_attempts {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {
                        return Err(FetchError::Cancelled { url: url.to_string() });
                    }
                    _ = tokio::time::sleep(self.policy.delay) => {}
                }
            }
        }

        warn!(%url, attempts = max_attempts, "giving up on catalog request");
        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: max_attempts,
            last_error,
        })
    }

    async fn attempt(
        &self,
        url: &Url,
        credentials: Option<&BasicCredentials>,
    ) -> Result<String, FetchError> {
        let transient = |message: String| FetchError::Transient {
            url: url.to_string(),
            message,
        };

        let mut request = self.client.get(url.clone());
        if let Some(creds) = credentials {
            request = request.basic_auth(&creds.username, Some(&creds.password));
        }

        let resp = request.send().await.map_err(|e| transient(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(transient(format!("HTTP {}", status.as_u16())));
        }
        resp.text().await.map_err(|e| transient(e.to_string()))
    }
}
