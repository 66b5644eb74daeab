//! Image request model and validation.

use crate::error::{FluxError, Result, ValidationError, ValidationErrors};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prompt used when none is given.
pub const DEFAULT_PROMPT: &str = "ein fantastisches bild";

/// Smallest accepted width or height.
pub const MIN_DIMENSION: u32 = 256;
/// Largest accepted width or height.
pub const MAX_DIMENSION: u32 = 1440;
/// Width and height must be multiples of this.
pub const DIMENSION_STEP: u32 = 32;

const DEFAULT_DIMENSION: u32 = 1024;
const DEFAULT_SAFETY_TOLERANCE: u32 = 2;

const GUIDANCE_RANGE: (f64, f64) = (1.5, 5.0);
const SAFETY_TOLERANCE_RANGE: (u32, u32) = (0, 6);
const INTERVAL_RANGE: (u32, u32) = (1, 4);

/// Flux model variants. The variant selects the submission endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageVariant {
    /// FLUX1.1 [pro].
    #[serde(rename = "flux-pro-1.1")]
    FluxPro11,
    /// FLUX.1 [pro].
    #[default]
    #[serde(rename = "flux-pro", alias = "flux.1-pro")]
    FluxPro,
    /// FLUX.1 [dev].
    #[serde(rename = "flux-dev", alias = "flux.1-dev")]
    FluxDev,
}

impl ImageVariant {
    /// All variants, in display order.
    pub const ALL: [ImageVariant; 3] = [Self::FluxPro11, Self::FluxPro, Self::FluxDev];

    /// Returns the API identifier, which is also the endpoint path segment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FluxPro11 => "flux-pro-1.1",
            Self::FluxPro => "flux-pro",
            Self::FluxDev => "flux-dev",
        }
    }
}

impl fmt::Display for ImageVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageVariant {
    type Err = FluxError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "flux-pro-1.1" => Ok(Self::FluxPro11),
            "flux-pro" | "flux.1-pro" => Ok(Self::FluxPro),
            "flux-dev" | "flux.1-dev" => Ok(Self::FluxDev),
            other => Err(FluxError::Validation(
                vec![ValidationError::field(
                    "variant",
                    format!(
                        "Input should be one of {}, got '{other}'",
                        Self::ALL.map(|v| v.as_str()).join(", ")
                    ),
                    "enum",
                )]
                .into(),
            )),
        }
    }
}

/// A validated image generation request.
///
/// Only obtainable through [`ImageRequestBuilder::build`] or [`Default`], so every
/// instance satisfies the API's bounds. Serializes to the JSON body the submission
/// endpoint expects; unset optional fields are omitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRequest {
    prompt: String,
    width: u32,
    height: u32,
    variant: ImageVariant,
    #[serde(skip_serializing_if = "Option::is_none")]
    steps: Option<u32>,
    prompt_upsampling: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    guidance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    safety_tolerance: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interval: Option<u32>,
}

impl Default for ImageRequest {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            width: DEFAULT_DIMENSION,
            height: DEFAULT_DIMENSION,
            variant: ImageVariant::default(),
            steps: None,
            prompt_upsampling: false,
            seed: None,
            guidance: None,
            safety_tolerance: Some(DEFAULT_SAFETY_TOLERANCE),
            interval: None,
        }
    }
}

impl ImageRequest {
    /// Creates a builder seeded with the default values.
    pub fn builder() -> ImageRequestBuilder {
        ImageRequestBuilder::new()
    }

    /// The text prompt.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Model variant.
    pub fn variant(&self) -> ImageVariant {
        self.variant
    }

    /// Number of diffusion steps.
    pub fn steps(&self) -> Option<u32> {
        self.steps
    }

    /// Whether the API should rewrite the prompt.
    pub fn prompt_upsampling(&self) -> bool {
        self.prompt_upsampling
    }

    /// Seed for deterministic generation.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Guidance scale.
    pub fn guidance(&self) -> Option<f64> {
        self.guidance
    }

    /// Moderation tolerance, 0 strictest.
    pub fn safety_tolerance(&self) -> Option<u32> {
        self.safety_tolerance
    }

    /// Guidance interval.
    pub fn interval(&self) -> Option<u32> {
        self.interval
    }
}

/// Builder for [`ImageRequest`].
#[derive(Debug, Clone)]
pub struct ImageRequestBuilder {
    inner: ImageRequest,
}

impl Default for ImageRequestBuilder {
    fn default() -> Self {
        Self {
            inner: ImageRequest::default(),
        }
    }
}

impl ImageRequestBuilder {
    /// Creates a builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the prompt.
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.inner.prompt = prompt.into();
        self
    }

    /// Sets the width.
    pub fn width(mut self, width: u32) -> Self {
        self.inner.width = width;
        self
    }

    /// Sets the height.
    pub fn height(mut self, height: u32) -> Self {
        self.inner.height = height;
        self
    }

    /// Sets both dimensions.
    pub fn size(self, width: u32, height: u32) -> Self {
        self.width(width).height(height)
    }

    /// Sets the model variant.
    pub fn variant(mut self, variant: ImageVariant) -> Self {
        self.inner.variant = variant;
        self
    }

    /// Sets the step count.
    pub fn steps(mut self, steps: u32) -> Self {
        self.inner.steps = Some(steps);
        self
    }

    /// Enables or disables prompt upsampling.
    pub fn prompt_upsampling(mut self, enabled: bool) -> Self {
        self.inner.prompt_upsampling = enabled;
        self
    }

    /// Sets the seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.inner.seed = Some(seed);
        self
    }

    /// Sets the guidance scale.
    pub fn guidance(mut self, guidance: f64) -> Self {
        self.inner.guidance = Some(guidance);
        self
    }

    /// Sets the safety tolerance. Defaults to 2.
    pub fn safety_tolerance(mut self, tolerance: u32) -> Self {
        self.inner.safety_tolerance = Some(tolerance);
        self
    }

    /// Leaves the safety tolerance to the API's default.
    pub fn without_safety_tolerance(mut self) -> Self {
        self.inner.safety_tolerance = None;
        self
    }

    /// Sets the guidance interval.
    pub fn interval(mut self, interval: u32) -> Self {
        self.inner.interval = Some(interval);
        self
    }

    /// Validates every field and returns the request.
    ///
    /// All failing fields are reported together, not only the first.
    pub fn build(self) -> Result<ImageRequest> {
        let req = self.inner;
        let mut errors = ValidationErrors::new();

        check_dimension(&mut errors, "width", req.width);
        check_dimension(&mut errors, "height", req.height);
        if let Some(guidance) = req.guidance {
            check_range(&mut errors, "guidance", guidance, GUIDANCE_RANGE);
        }
        if let Some(tolerance) = req.safety_tolerance {
            check_range(
                &mut errors,
                "safety_tolerance",
                tolerance,
                SAFETY_TOLERANCE_RANGE,
            );
        }
        if let Some(interval) = req.interval {
            check_range(&mut errors, "interval", interval, INTERVAL_RANGE);
        }

        errors.into_result()?;
        Ok(req)
    }
}

/// Reports at most one failure for the field: the range first, then the step.
fn check_dimension(errors: &mut ValidationErrors, field: &str, value: u32) {
    let in_range = check_range(errors, field, value, (MIN_DIMENSION, MAX_DIMENSION));
    if in_range && value % DIMENSION_STEP != 0 {
        errors.push(ValidationError::field(
            field,
            format!("Input should be a multiple of {DIMENSION_STEP}"),
            "multiple_of",
        ));
    }
}

/// Returns true when the value is within the inclusive bounds.
fn check_range<T>(
    errors: &mut ValidationErrors,
    field: &str,
    value: T,
    (min, max): (T, T),
) -> bool
where
    T: PartialOrd + fmt::Display,
{
    // Negated so NaN fails both checks.
    if !(value >= min) {
        errors.push(ValidationError::field(
            field,
            format!("Input should be greater than or equal to {min}"),
            "greater_than_equal",
        ));
        return false;
    }
    if !(value <= max) {
        errors.push(ValidationError::field(
            field,
            format!("Input should be less than or equal to {max}"),
            "less_than_equal",
        ));
        return false;
    }
    true
}
