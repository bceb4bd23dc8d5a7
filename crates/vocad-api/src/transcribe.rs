use std::collections::HashMap;

use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use bytes::Bytes;
use tracing::{debug, info};

use vocad_gen::intent::wants_iteration;
use vocad_types::api::TranscribeResponse;
use vocad_types::jobs::JobMode;

use crate::error::ApiError;
use crate::state::AppState;

const CHAIN_KEYS: &[&str] = &["chain_generate", "generate", "chain"];
const ASYNC_KEYS: &[&str] = &["async", "async_generate"];

fn truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

/// Look a parameter up in the query string first, then the form fields.
fn param<'a>(
    query: &'a HashMap<String, String>,
    form: &'a HashMap<String, String>,
    key: &str,
) -> Option<&'a str> {
    query
        .get(key)
        .or_else(|| form.get(key))
        .map(String::as_str)
}

fn flag(query: &HashMap<String, String>, form: &HashMap<String, String>, keys: &[&str]) -> bool {
    keys.iter()
        .filter_map(|key| param(query, form, key))
        .any(truthy)
}

/// POST /api/transcribe — transcribe the uploaded audio; when chaining is
/// requested, narrate a status sentence and run the detected intent
/// (iterate or generate), synchronously or as a background job.
pub async fn transcribe(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let speech = state
        .speech
        .as_ref()
        .ok_or_else(|| ApiError::not_configured("ELEVENLABS_API_KEY"))?;

    let mut audio: Option<(Bytes, String)> = None;
    let mut form: HashMap<String, String> = HashMap::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let filename = field.file_name().unwrap_or("audio.webm").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("failed to read audio: {e}")))?;
            audio = Some((bytes, filename));
        } else if !name.is_empty() {
            if let Ok(text) = field.text().await {
                form.insert(name, text);
            }
        }
    }

    let Some((bytes, filename)) = audio else {
        return Err(ApiError::bad_request(
            "no file provided; send multipart/form-data with a 'file' field",
        ));
    };
    debug!("transcribing {} bytes ({})", bytes.len(), filename);

    let text = speech
        .transcribe(bytes, &filename)
        .await
        .map_err(|e| ApiError::from_speech(e, state.debug))?;
    info!("transcript: {}", text);

    let iterate_intent = wants_iteration(&text);
    let do_chain = flag(&query, &form, CHAIN_KEYS);
    let do_async = flag(&query, &form, ASYNC_KEYS);
    let userid = param(&query, &form, "userid").map(str::to_string);
    let modelid = param(&query, &form, "modelid").map(str::to_string);

    // The transcript is the working prompt; an explicit prompt parameter
    // is the fallback when nothing usable was spoken.
    let prompt_param = param(&query, &form, "prompt").unwrap_or_default().trim().to_string();
    let gen_prompt = {
        let spoken = text.trim();
        if spoken.is_empty() {
            prompt_param
        } else {
            spoken.to_string()
        }
    };

    if !do_chain {
        return Ok(Json(TranscribeResponse {
            text,
            ..Default::default()
        })
        .into_response());
    }

    let (status_text, status_audio) = state.orchestrator.status_narration(&gen_prompt).await;
    let status_audio_b64 = status_audio.map(|bytes| B64.encode(bytes));
    let status_audio_format = status_audio_b64.as_ref().map(|_| "mp3".to_string());

    let base = TranscribeResponse {
        text: text.clone(),
        chained_generation: true,
        status_text: Some(status_text),
        status_audio_b64,
        status_audio_format,
        ..Default::default()
    };

    if iterate_intent {
        let (Some(userid), Some(modelid)) = (userid.clone(), modelid.clone()) else {
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(TranscribeResponse {
                    error: Some("Iteration requested but userid/modelid not provided.".into()),
                    ..base
                }),
            )
                .into_response());
        };
        if gen_prompt.is_empty() {
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(TranscribeResponse {
                    error: Some("Iteration requested but no prompt instruction captured.".into()),
                    ..base
                }),
            )
                .into_response());
        }

        if do_async {
            let job_id = state
                .jobs
                .submit(
                    state.orchestrator.clone(),
                    JobMode::Iterate,
                    gen_prompt,
                    Some(userid),
                    Some(modelid),
                )
                .await;
            return Ok(Json(TranscribeResponse {
                intent: Some("iterate".into()),
                job_id: Some(job_id),
                r#async: Some(true),
                ..base
            })
            .into_response());
        }

        let scad_code = state
            .orchestrator
            .iterate(&gen_prompt, &userid, &modelid)
            .await
            .map_err(|e| ApiError::from_gen(e, state.debug))?;
        return Ok(Json(TranscribeResponse {
            intent: Some("iterate".into()),
            model_id: Some(modelid),
            scad_code: Some(scad_code),
            ..base
        })
        .into_response());
    }

    // Generate a new model
    if gen_prompt.is_empty() {
        return Ok(Json(TranscribeResponse {
            chained_generation: false,
            error: Some("No prompt text captured. Provide ?prompt=... or speak a description.".into()),
            ..base
        })
        .into_response());
    }

    if do_async {
        let job_id = state
            .jobs
            .submit(
                state.orchestrator.clone(),
                JobMode::Generate,
                gen_prompt,
                userid,
                modelid,
            )
            .await;
        return Ok(Json(TranscribeResponse {
            intent: Some("generate".into()),
            job_id: Some(job_id),
            r#async: Some(true),
            ..base
        })
        .into_response());
    }

    let (model_id, scad_code) = state
        .orchestrator
        .generate(&gen_prompt, userid.as_deref(), modelid)
        .await
        .map_err(|e| ApiError::from_gen(e, state.debug))?;
    Ok(Json(TranscribeResponse {
        intent: Some("generate".into()),
        model_id: Some(model_id),
        scad_code,
        ..base
    })
    .into_response())
}
