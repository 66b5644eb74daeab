#![warn(missing_docs)]
//! fluxgen - Flux image generation via the Black Forest Labs API.
//!
//! Jobs are asynchronous on the API side: a request is submitted, the API returns
//! a job id, and the client polls for the result until the job reaches a terminal
//! status.
//!
//! # Quick Start
//!
//! ```no_run
//! use fluxgen::{FluxProvider, ImageRequest, ImageVariant, JobOutcome};
//!
//! #[tokio::main]
//! async fn main() -> fluxgen::Result<()> {
//!     let provider = FluxProvider::builder().build()?;
//!     let request = ImageRequest::builder()
//!         .prompt("A lighthouse at dusk")
//!         .size(1344, 768)
//!         .variant(ImageVariant::FluxPro11)
//!         .build()?;
//!
//!     match provider.generate(&request).await? {
//!         JobOutcome::Ready { sample, .. } => println!("{sample}"),
//!         other => eprintln!("job ended with {}", other.status()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `cli` (default): the `fluxgen` command-line tool

mod error;
pub mod image;

// Re-export error types at crate root
pub use error::{
    FluxError, HttpValidationError, LocItem, Result, ValidationDetail, ValidationError,
    ValidationErrors,
};

pub use image::poll::poll_until_terminal;
pub use image::providers::{FluxProvider, FluxProviderBuilder, DEFAULT_BASE_URL};
pub use image::{
    AsyncResponse, Backoff, BackoffGrowth, ImageProvider, ImageProviderExt, ImageRequest,
    ImageRequestBuilder, ImageVariant, JobOutcome, JobStatus, PollOptions, ResultResponse,
};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{FluxError, Result};
    pub use crate::image::providers::FluxProvider;
    pub use crate::image::{
        ImageProvider, ImageProviderExt, ImageRequest, ImageVariant, JobOutcome, JobStatus,
        PollOptions,
    };
}
