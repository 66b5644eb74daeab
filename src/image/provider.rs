//! Image provider trait and utilities.

use crate::error::Result;
use crate::image::poll::{poll_until_terminal, PollOptions};
use crate::image::request::ImageRequest;
use crate::image::types::{JobOutcome, ResultResponse};
use async_trait::async_trait;

/// The two calls an asynchronous image API exposes.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Submits a generation job and returns its identifier.
    async fn submit(&self, request: &ImageRequest) -> Result<String>;

    /// Fetches the current state of a job.
    async fn fetch_result(&self, job_id: &str) -> Result<ResultResponse>;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str;
}

/// Submit, poll and interpret, for any provider.
#[async_trait]
pub trait ImageProviderExt: ImageProvider {
    /// Polls a submitted job until it reaches a terminal status.
    async fn wait_for_result(
        &self,
        job_id: &str,
        options: &PollOptions,
    ) -> Result<ResultResponse> {
        poll_until_terminal(self, job_id, options).await
    }

    /// Submits the request, waits for the job and interprets the terminal status.
    async fn generate_with(
        &self,
        request: &ImageRequest,
        options: &PollOptions,
    ) -> Result<JobOutcome> {
        let job_id = self.submit(request).await?;
        tracing::debug!(
            provider = self.name(),
            job_id = %job_id,
            variant = %request.variant(),
            "submitted generation request"
        );

        let response = self.wait_for_result(&job_id, options).await?;
        let outcome = JobOutcome::from_response(response)?;
        match outcome.sample_url() {
            Some(url) => tracing::debug!(job_id = %job_id, url = %url, "generation complete"),
            None => tracing::warn!(
                job_id = %job_id,
                status = %outcome.status(),
                "generation finished without an image"
            ),
        }
        Ok(outcome)
    }
}

impl<T: ImageProvider + ?Sized> ImageProviderExt for T {}
