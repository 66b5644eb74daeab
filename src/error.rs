//! Error types for Flux job submission and polling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One element of a validation error location path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocItem {
    /// A field name.
    Field(String),
    /// A position within a sequence.
    Index(usize),
}

impl fmt::Display for LocItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, "{name}"),
            Self::Index(idx) => write!(f, "{idx}"),
        }
    }
}

impl From<&str> for LocItem {
    fn from(name: &str) -> Self {
        Self::Field(name.to_string())
    }
}

/// A single validation failure, shaped like the API's own 422 detail entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Path to the offending field.
    pub loc: Vec<LocItem>,
    /// Human-readable message.
    pub msg: String,
    /// Machine-readable error kind (e.g. `multiple_of`).
    #[serde(rename = "type")]
    pub kind: String,
}

impl ValidationError {
    /// Creates an error for a top-level field.
    pub fn field(name: &str, msg: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            loc: vec![name.into()],
            msg: msg.into(),
            kind: kind.into(),
        }
    }

    /// Returns the location joined with dots, e.g. `body.width`.
    pub fn path(&self) -> String {
        self.loc
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.path(), self.msg, self.kind)
    }
}

/// Every validation failure found for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure.
    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    /// Returns true if no failures were recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of failures.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the recorded failures.
    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    /// Returns true if any failure points at the given top-level field.
    pub fn has_field(&self, name: &str) -> bool {
        self.0
            .iter()
            .any(|e| matches!(e.loc.first(), Some(LocItem::Field(f)) if f == name))
    }

    /// Converts into `Ok(())` when empty, otherwise into a validation error.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(FluxError::Validation(self))
        }
    }

    /// Consumes the collection, returning the inner list.
    pub fn into_inner(self) -> Vec<ValidationError> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl From<Vec<ValidationError>> for ValidationErrors {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self(errors)
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Body of a 422 response. The API sends a list, older revisions a single entry.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpValidationError {
    /// The reported failures.
    pub detail: ValidationDetail,
}

/// The `detail` member of [`HttpValidationError`].
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ValidationDetail {
    /// A list of failures.
    Many(Vec<ValidationError>),
    /// A single failure.
    One(ValidationError),
}

impl From<HttpValidationError> for ValidationErrors {
    fn from(err: HttpValidationError) -> Self {
        match err.detail {
            ValidationDetail::Many(list) => Self(list),
            ValidationDetail::One(single) => Self(vec![single]),
        }
    }
}

/// Errors that can occur while submitting or polling a generation job.
#[derive(Debug, thiserror::Error)]
pub enum FluxError {
    /// Request parameters failed validation before anything was sent.
    #[error("invalid request: {0}")]
    Validation(ValidationErrors),

    /// API key missing.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API answered with a non-success status.
    #[error("HTTP error: {status} - {body}")]
    Http { status: u16, body: String },

    /// Response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Response carried a status this client does not understand.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A terminal success response lacked an expected result key.
    #[error("missing field `{0}` in result")]
    MissingField(String),

    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Polling exceeded its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Polling was cancelled by the caller.
    #[error("polling cancelled")]
    Cancelled,

    /// Sample URL expired before download.
    #[error("download URL expired")]
    UrlExpired,

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FluxError {
    /// Parses the body of a 422 response into validation details.
    ///
    /// Returns `None` for any other error or for a body that is not in the API's
    /// validation error format.
    pub fn validation_details(&self) -> Option<ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors.clone()),
            Self::Http { status: 422, body } => serde_json::from_str::<HttpValidationError>(body)
                .ok()
                .map(ValidationErrors::from),
            _ => None,
        }
    }

    /// Returns the HTTP status code, if this error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for Flux operations.
pub type Result<T> = std::result::Result<T, FluxError>;
