//! Image generation jobs: request model, provider seam, polling and outcomes.

pub mod poll;
mod provider;
pub mod providers;
mod request;
mod types;

pub use poll::{Backoff, BackoffGrowth, PollOptions};
pub use provider::{ImageProvider, ImageProviderExt};
pub use request::{
    ImageRequest, ImageRequestBuilder, ImageVariant, DEFAULT_PROMPT, DIMENSION_STEP,
    MAX_DIMENSION, MIN_DIMENSION,
};
pub use types::{AsyncResponse, JobOutcome, JobStatus, ResultResponse, SAMPLE_KEY};
