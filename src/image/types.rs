//! Wire types for job submission and result polling, plus the interpreted outcome.

use crate::error::{FluxError, Result};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Result map key holding the generated image URL.
pub const SAMPLE_KEY: &str = "sample";

/// Response to a job submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AsyncResponse {
    /// Server-assigned job identifier.
    pub id: String,
}

/// Status of a submitted job.
///
/// Variants are stable tags; the API's spelling lives in [`JobStatus::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Still generating.
    Pending,
    /// Finished; the result holds the sample URL.
    Ready,
    /// Generation failed.
    Error,
    /// The prompt was rejected by moderation.
    RequestModerated,
    /// The generated image was rejected by moderation.
    ContentModerated,
    /// The API does not know the job id.
    TaskNotFound,
}

impl JobStatus {
    /// All statuses.
    pub const ALL: [JobStatus; 6] = [
        Self::Pending,
        Self::Ready,
        Self::Error,
        Self::RequestModerated,
        Self::ContentModerated,
        Self::TaskNotFound,
    ];

    /// Returns the status string used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Ready => "Ready",
            Self::Error => "Error",
            Self::RequestModerated => "Request Moderated",
            Self::ContentModerated => "Content Moderated",
            Self::TaskNotFound => "Task not found",
        }
    }

    /// Looks up a status by its wire string.
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Returns true once polling should stop.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = FluxError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_wire(s).ok_or_else(|| FluxError::Protocol(format!("unknown status {s:?}")))
    }
}

impl Serialize for JobStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Response to a result fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultResponse {
    /// Job identifier.
    pub id: String,
    /// Current status.
    pub status: JobStatus,
    /// Result payload, present once the job has content.
    pub result: Option<Map<String, Value>>,
}

/// Shape check happens here; the status string is interpreted separately so an
/// unknown status is a protocol error rather than a decode error.
#[derive(Debug, Deserialize)]
struct RawResultResponse {
    id: String,
    status: String,
    #[serde(default)]
    result: Option<Map<String, Value>>,
}

impl ResultResponse {
    /// Decodes a result body.
    ///
    /// Fails with [`FluxError::Decode`] when the JSON has the wrong shape and with
    /// [`FluxError::Protocol`] when the status is not one this client knows.
    pub fn from_json(body: &str) -> Result<Self> {
        let raw: RawResultResponse = serde_json::from_str(body)
            .map_err(|e| FluxError::Decode(format!("invalid result response: {e}")))?;
        Ok(Self {
            status: raw.status.parse()?,
            id: raw.id,
            result: raw.result,
        })
    }
}

/// Interpreted terminal state of a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The image is ready at `sample`.
    Ready {
        /// Job identifier.
        id: String,
        /// URL of the generated image.
        sample: String,
        /// Full result payload (seed, timings, ...).
        result: Map<String, Value>,
    },
    /// The API reported a generation error.
    Failed {
        /// Job identifier.
        id: String,
        /// Raw result payload, as the failure description.
        details: Option<Map<String, Value>>,
    },
    /// The prompt was rejected.
    RequestModerated {
        /// Job identifier.
        id: String,
    },
    /// The generated content was rejected.
    ContentModerated {
        /// Job identifier.
        id: String,
    },
    /// The API does not know the job.
    TaskNotFound {
        /// Job identifier.
        id: String,
    },
}

impl JobOutcome {
    /// Interprets a terminal response.
    ///
    /// A `Ready` response must carry a string under [`SAMPLE_KEY`]; a `Pending`
    /// response is not terminal and is rejected.
    pub fn from_response(response: ResultResponse) -> Result<Self> {
        let ResultResponse { id, status, result } = response;
        match status {
            JobStatus::Ready => {
                let result = result.unwrap_or_default();
                let sample = result
                    .get(SAMPLE_KEY)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| FluxError::MissingField(SAMPLE_KEY.to_string()))?;
                Ok(Self::Ready { id, sample, result })
            }
            JobStatus::Error => Ok(Self::Failed {
                id,
                details: result,
            }),
            JobStatus::RequestModerated => Ok(Self::RequestModerated { id }),
            JobStatus::ContentModerated => Ok(Self::ContentModerated { id }),
            JobStatus::TaskNotFound => Ok(Self::TaskNotFound { id }),
            JobStatus::Pending => Err(FluxError::Protocol(format!(
                "job {id} is still pending"
            ))),
        }
    }

    /// Returns the job identifier.
    pub fn id(&self) -> &str {
        match self {
            Self::Ready { id, .. }
            | Self::Failed { id, .. }
            | Self::RequestModerated { id }
            | Self::ContentModerated { id }
            | Self::TaskNotFound { id } => id,
        }
    }

    /// Returns the terminal status this outcome was built from.
    pub fn status(&self) -> JobStatus {
        match self {
            Self::Ready { .. } => JobStatus::Ready,
            Self::Failed { .. } => JobStatus::Error,
            Self::RequestModerated { .. } => JobStatus::RequestModerated,
            Self::ContentModerated { .. } => JobStatus::ContentModerated,
            Self::TaskNotFound { .. } => JobStatus::TaskNotFound,
        }
    }

    /// Returns the image URL for a ready job.
    pub fn sample_url(&self) -> Option<&str> {
        match self {
            Self::Ready { sample, .. } => Some(sample),
            _ => None,
        }
    }

    /// Returns true if the job produced an image.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Returns the seed the API reports for a ready job, if any.
    pub fn seed(&self) -> Option<u64> {
        match self {
            Self::Ready { result, .. } => result.get("seed").and_then(Value::as_u64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: JobStatus, result: Option<Value>) -> ResultResponse {
        ResultResponse {
            id: "abc".into(),
            status,
            result: result.map(|v| v.as_object().cloned().unwrap()),
        }
    }

    #[test]
    fn test_status_wire_strings() {
        assert_eq!(JobStatus::TaskNotFound.as_str(), "Task not found");
        assert_eq!(JobStatus::RequestModerated.as_str(), "Request Moderated");
        assert_eq!(JobStatus::ContentModerated.as_str(), "Content Moderated");
        for status in JobStatus::ALL {
            assert_eq!(JobStatus::from_wire(status.as_str()), Some(status));
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_only_pending_is_non_terminal() {
        for status in JobStatus::ALL {
            assert_eq!(status.is_terminal(), status != JobStatus::Pending);
        }
    }

    #[test]
    fn test_unknown_status_is_protocol_error() {
        assert!(matches!(
            "Queued".parse::<JobStatus>(),
            Err(FluxError::Protocol(_))
        ));
        // Case matters on the wire.
        assert!(JobStatus::from_wire("ready").is_none());
    }

    #[test]
    fn test_result_response_from_json() {
        let body = r#"{"id":"abc","status":"Ready","result":{"sample":"http://x/img.png","seed":7}}"#;
        let resp = ResultResponse::from_json(body).unwrap();
        assert_eq!(resp.id, "abc");
        assert_eq!(resp.status, JobStatus::Ready);
        assert_eq!(resp.result.unwrap()["seed"], 7);

        let resp = ResultResponse::from_json(r#"{"id":"abc","status":"Pending"}"#).unwrap();
        assert_eq!(resp.status, JobStatus::Pending);
        assert!(resp.result.is_none());

        let resp =
            ResultResponse::from_json(r#"{"id":"abc","status":"Task not found","result":null}"#)
                .unwrap();
        assert_eq!(resp.status, JobStatus::TaskNotFound);
    }

    #[test]
    fn test_result_response_errors() {
        assert!(matches!(
            ResultResponse::from_json(r#"{"id":"abc","status":"Exploded"}"#),
            Err(FluxError::Protocol(_))
        ));
        assert!(matches!(
            ResultResponse::from_json(r#"{"status":"Ready"}"#),
            Err(FluxError::Decode(_))
        ));
        assert!(matches!(
            ResultResponse::from_json(r#"{"id":"abc","status":"Ready","result":"nope"}"#),
            Err(FluxError::Decode(_))
        ));
        assert!(matches!(
            ResultResponse::from_json("<html>"),
            Err(FluxError::Decode(_))
        ));
    }

    #[test]
    fn test_result_response_serializes_wire_status() {
        let value = serde_json::to_value(response(JobStatus::TaskNotFound, None)).unwrap();
        assert_eq!(
            value,
            json!({"id": "abc", "status": "Task not found", "result": null})
        );
    }

    #[test]
    fn test_outcome_ready() {
        let outcome = JobOutcome::from_response(response(
            JobStatus::Ready,
            Some(json!({"sample": "http://x/img.png", "seed": 42})),
        ))
        .unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.sample_url(), Some("http://x/img.png"));
        assert_eq!(outcome.seed(), Some(42));
        assert_eq!(outcome.status(), JobStatus::Ready);
        assert_eq!(outcome.id(), "abc");
    }

    #[test]
    fn test_outcome_ready_without_sample() {
        let err = JobOutcome::from_response(response(JobStatus::Ready, Some(json!({"seed": 1}))))
            .unwrap_err();
        assert!(matches!(err, FluxError::MissingField(ref f) if f == "sample"));

        let err = JobOutcome::from_response(response(JobStatus::Ready, None)).unwrap_err();
        assert!(matches!(err, FluxError::MissingField(_)));

        let err = JobOutcome::from_response(response(JobStatus::Ready, Some(json!({"sample": 3}))))
            .unwrap_err();
        assert!(matches!(err, FluxError::MissingField(_)));
    }

    #[test]
    fn test_outcome_error_keeps_payload() {
        let outcome = JobOutcome::from_response(response(
            JobStatus::Error,
            Some(json!({"error": "out of memory"})),
        ))
        .unwrap();
        match &outcome {
            JobOutcome::Failed { details, .. } => {
                assert_eq!(details.as_ref().unwrap()["error"], "out of memory");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(!outcome.is_success());
        assert!(outcome.sample_url().is_none());
    }

    #[test]
    fn test_outcome_moderation_and_not_found() {
        for status in [
            JobStatus::RequestModerated,
            JobStatus::ContentModerated,
            JobStatus::TaskNotFound,
        ] {
            let outcome = JobOutcome::from_response(response(status, None)).unwrap();
            assert_eq!(outcome.status(), status);
            assert!(outcome.sample_url().is_none());
        }
    }

    #[test]
    fn test_outcome_rejects_pending() {
        assert!(matches!(
            JobOutcome::from_response(response(JobStatus::Pending, None)),
            Err(FluxError::Protocol(_))
        ));
    }
}
