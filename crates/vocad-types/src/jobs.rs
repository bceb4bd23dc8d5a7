use serde::Serialize;
use uuid::Uuid;

/// Lifecycle of an asynchronous generation job. `Done` and `Error` are
/// terminal; a record never leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    Generate,
    Iterate,
}

/// Poll-able record for one background generation request. Mutated only by
/// the worker that owns the job.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub mode: JobMode,
    pub prompt: String,
    pub userid: Option<String>,
    pub modelid: Option<String>,
    /// Id of the produced model, populated on `Done`.
    pub model_id: Option<String>,
    pub scad_code: Option<String>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
