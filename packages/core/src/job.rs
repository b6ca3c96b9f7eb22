//! Job and result records exchanged with the external generation worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::OriginId;

/// Correlation id for a submitted job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status reported by the generation worker for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Picked up from the task channel but not started.
    Queued,
    /// Generation is running.
    Processing,
    /// Output was written to `output_path`.
    Completed,
    /// Generation failed; see `error`.
    Failed,
}

impl JobStatus {
    /// Terminal results are consumed from the result channel.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Get a simple status string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of generation work pushed onto the task channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
    /// Correlation id echoed back in the matching result.
    pub job_id: JobId,
    /// Reference media, in the order the worker expects them.
    pub input_refs: Vec<String>,
    /// Directory the worker writes its output into.
    pub output_dir: String,
    /// Caller the job was submitted for.
    pub origin_id: OriginId,
    /// When the job was pushed.
    pub submitted_at: DateTime<Utc>,
}

impl GenerationJob {
    /// Create a job with a fresh id, stamped now.
    pub fn new(
        input_refs: Vec<String>,
        output_dir: impl Into<String>,
        origin_id: OriginId,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            input_refs,
            output_dir: output_dir.into(),
            origin_id,
            submitted_at: Utc::now(),
        }
    }

    /// Two jobs are duplicates when they reference the same inputs.
    pub fn same_inputs(&self, input_refs: &[String]) -> bool {
        self.input_refs == input_refs
    }
}

/// Outcome record appended to the result channel by the generation worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Present iff `status` is `completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Identifies the worker instance that produced the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    /// Present iff `status` is `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationResult {
    /// A progress record with a non-terminal status.
    pub fn progress(job_id: JobId, status: JobStatus) -> Self {
        Self {
            job_id,
            status,
            output_path: None,
            service_id: None,
            error: None,
        }
    }

    /// A completed record pointing at the generated file.
    pub fn completed(job_id: JobId, output_path: impl Into<String>) -> Self {
        Self {
            output_path: Some(output_path.into()),
            ..Self::progress(job_id, JobStatus::Completed)
        }
    }

    /// A failed record carrying the worker's error detail.
    pub fn failed(job_id: JobId, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::progress(job_id, JobStatus::Failed)
        }
    }

    /// Tag the record with the producing worker instance.
    pub fn with_service_id(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = Some(service_id.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_wire_format_uses_lowercase_status() {
        let id = JobId::new();
        let json = serde_json::to_value(GenerationResult::completed(id, "out.mp4")).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["job_id"], id.to_string());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn result_parses_worker_record_without_optional_fields() {
        let id = JobId::new();
        let raw = format!(r#"{{"job_id":"{id}","status":"processing"}}"#);
        let parsed: GenerationResult = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, GenerationResult::progress(id, JobStatus::Processing));
        assert!(!parsed.is_terminal());
    }
}
