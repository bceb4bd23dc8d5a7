use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use vocad_types::jobs::JobRecord;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/generation/job/{id} — poll a background generation job.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
    let job_id = parse_job_id(&job_id)?;
    state
        .jobs
        .get(job_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "job not found"))
}

/// A malformed id can never name a job, so the caller sees the same 404
/// envelope as for an unknown one.
fn parse_job_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::new(StatusCode::NOT_FOUND, "job not found"))
}
