//! Flux (Black Forest Labs) job client.

use crate::error::{FluxError, Result};
use crate::image::poll::{Backoff, PollOptions};
use crate::image::provider::{ImageProvider, ImageProviderExt};
use crate::image::request::{ImageRequest, ImageVariant};
use crate::image::types::{AsyncResponse, JobOutcome, ResultResponse};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.bfl.ml/v1";

const API_KEY_ENV: &str = "BFL_API_KEY";
const API_KEY_HEADER: &str = "x-key";

/// Builder for FluxProvider.
#[derive(Debug, Clone)]
pub struct FluxProviderBuilder {
    api_key: Option<String>,
    base_url: String,
    poll: PollOptions,
}

impl Default for FluxProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            poll: PollOptions::default(),
        }
    }
}

impl FluxProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `BFL_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API root, e.g. for a regional endpoint or a test server.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the delay before each poll, keeping the rest of the schedule.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll.backoff.base = interval;
        self
    }

    /// Sets the full polling schedule.
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.poll.backoff = backoff;
        self
    }

    /// Sets the maximum time to wait for a job.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.poll.timeout = Some(timeout);
        self
    }

    /// Waits for jobs without a deadline.
    pub fn no_timeout(mut self) -> Self {
        self.poll.timeout = None;
        self
    }

    /// Cancels any polling in progress when the token fires.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.poll.cancel = Some(token);
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<FluxProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                FluxError::Auth(format!("{API_KEY_ENV} not set and no API key provided"))
            })?;

        Ok(FluxProvider {
            client: reqwest::Client::new(),
            api_key,
            base_url: self.base_url,
            poll: self.poll,
        })
    }
}

/// Flux image generation client.
pub struct FluxProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    poll: PollOptions,
}

impl FluxProvider {
    /// Creates a new `FluxProviderBuilder`.
    pub fn builder() -> FluxProviderBuilder {
        FluxProviderBuilder::new()
    }

    /// The API root this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Polling settings used by [`FluxProvider::generate`].
    pub fn poll_options(&self) -> &PollOptions {
        &self.poll
    }

    /// Submits the request and polls until the job reaches a terminal status.
    pub async fn generate(&self, request: &ImageRequest) -> Result<JobOutcome> {
        self.generate_with(request, &self.poll).await
    }

    /// Downloads a finished sample.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 403 || status.as_u16() == 410 {
                return Err(FluxError::UrlExpired);
            }
            return Err(FluxError::Http {
                status: status.as_u16(),
                body: "failed to download image".into(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Checks that the API is reachable and accepts the key.
    pub async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(self.result_url())
            .query(&[("id", "health-check")])
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(FluxError::Auth("Invalid API key".into())),
            _ => Ok(()),
        }
    }

    fn submit_url(&self, variant: ImageVariant) -> String {
        format!("{}/{}", self.base_url, variant.as_str())
    }

    fn result_url(&self) -> String {
        format!("{}/get_result", self.base_url)
    }
}

#[async_trait]
impl ImageProvider for FluxProvider {
    async fn submit(&self, request: &ImageRequest) -> Result<String> {
        let response = self
            .client
            .post(self.submit_url(request.variant()))
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await?;

        let body = read_body(response).await?;
        let submitted: AsyncResponse = serde_json::from_str(&body)
            .map_err(|e| FluxError::Decode(format!("invalid submit response: {e}")))?;
        Ok(submitted.id)
    }

    async fn fetch_result(&self, job_id: &str) -> Result<ResultResponse> {
        let response = self
            .client
            .get(self.result_url())
            .query(&[("id", job_id)])
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let body = read_body(response).await?;
        ResultResponse::from_json(&body)
    }

    fn name(&self) -> &str {
        "Flux (Black Forest Labs)"
    }
}

/// Returns the body of a successful response, or the status and body as an error.
async fn read_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FluxError::Http {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::poll::BackoffGrowth;

    #[test]
    fn test_builder_with_explicit_key() {
        let provider = FluxProviderBuilder::new().api_key("bfl-test").build();
        assert!(provider.is_ok());
    }

    #[test]
    fn test_builder_missing_key() {
        std::env::remove_var(API_KEY_ENV);

        let result = FluxProviderBuilder::new().build();
        assert!(matches!(result, Err(FluxError::Auth(_))));

        let result = FluxProviderBuilder::new().api_key("  ").build();
        assert!(matches!(result, Err(FluxError::Auth(_))));
    }

    #[test]
    fn test_builder_defaults() {
        let provider = FluxProvider::builder().api_key("k").build().unwrap();
        assert_eq!(provider.base_url(), DEFAULT_BASE_URL);
        assert_eq!(provider.poll_options().timeout, Some(Duration::from_secs(120)));
        assert_eq!(provider.poll_options().backoff, Backoff::default());
        assert!(provider.poll_options().cancel.is_none());
    }

    #[test]
    fn test_builder_custom_polling() {
        let provider = FluxProviderBuilder::new()
            .api_key("k")
            .backoff(Backoff::exponential(Duration::from_secs(1)))
            .poll_interval(Duration::from_secs(2))
            .timeout(Duration::from_secs(600))
            .build()
            .unwrap();
        assert_eq!(provider.poll.backoff.base, Duration::from_secs(2));
        assert_eq!(provider.poll.backoff.growth, BackoffGrowth::Exponential);
        assert_eq!(provider.poll.timeout, Some(Duration::from_secs(600)));

        let provider = FluxProviderBuilder::new().api_key("k").no_timeout().build().unwrap();
        assert!(provider.poll.timeout.is_none());
    }

    #[test]
    fn test_urls() {
        let provider = FluxProviderBuilder::new()
            .api_key("k")
            .base_url("http://localhost:8080/v1/")
            .build()
            .unwrap();
        assert_eq!(
            provider.submit_url(ImageVariant::FluxPro11),
            "http://localhost:8080/v1/flux-pro-1.1"
        );
        assert_eq!(
            provider.submit_url(ImageVariant::FluxDev),
            "http://localhost:8080/v1/flux-dev"
        );
        assert_eq!(provider.result_url(), "http://localhost:8080/v1/get_result");
    }

    #[test]
    fn test_submit_response_deserialization() {
        let json = r#"{
            "id": "task-123",
            "polling_url": "https://api.bfl.ml/v1/get_result?id=task-123"
        }"#;
        let resp: AsyncResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id, "task-123");
    }
}
