//! Image generation providers.

mod flux;

pub use flux::{FluxProvider, FluxProviderBuilder, DEFAULT_BASE_URL};
