use axum::extract::State;
use axum::Json;

use vocad_types::api::{IterateRequest, IterateResponse};

use crate::error::ApiError;
use crate::extract::JsonOrForm;
use crate::state::AppState;

/// POST /api/iterate — revise an existing model synchronously.
pub async fn iterate(
    State(state): State<AppState>,
    JsonOrForm(req): JsonOrForm<IterateRequest>,
) -> Result<Json<IterateResponse>, ApiError> {
    let nonempty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let (Some(userid), Some(modelid), Some(prompt)) = (
        nonempty(req.userid),
        nonempty(req.modelid),
        nonempty(req.prompt),
    ) else {
        return Err(ApiError::bad_request(
            "userid, modelid and prompt are required",
        ));
    };

    let scad_code = state
        .orchestrator
        .iterate(&prompt, &userid, &modelid)
        .await
        .map_err(|e| ApiError::from_gen(e, state.debug))?;

    Ok(Json(IterateResponse {
        success: true,
        scad_code,
    }))
}
