use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use tracing::warn;

use vocad_types::api::{NarrationQuery, NarrationResponse, SummaryRequest, SummaryResponse};

use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/getresponse — one spoken "generating now" sentence for the
/// supplied context text.
pub async fn get_response(
    State(state): State<AppState>,
    Query(query): Query<NarrationQuery>,
) -> Result<(StatusCode, Json<NarrationResponse>), ApiError> {
    let speech = state
        .speech
        .as_ref()
        .ok_or_else(|| ApiError::not_configured("ELEVENLABS_API_KEY"))?;

    let context = query.text.unwrap_or_default();
    let sentence = state.orchestrator.narration_sentence(&context).await;

    let audio = match speech.synthesize(&sentence).await {
        Ok(audio) => Some(audio),
        Err(e) => {
            warn!("narration TTS failed: {}", e);
            None
        }
    };

    Ok(narration_reply(sentence, audio))
}

/// A missing audio payload means TTS failed; the sentence still goes back
/// so the client can display it without sound.
fn narration_reply(
    sentence: String,
    audio: Option<Vec<u8>>,
) -> (StatusCode, Json<NarrationResponse>) {
    match audio {
        Some(audio) => (
            StatusCode::OK,
            Json(NarrationResponse {
                text: sentence,
                audio_b64: Some(B64.encode(audio)),
                format: Some("mp3".to_string()),
                error: None,
            }),
        ),
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(NarrationResponse {
                text: sentence,
                audio_b64: None,
                format: None,
                error: Some("TTS failed".to_string()),
            }),
        ),
    }
}

/// POST /api/generate-model-summary — short spoken description of a
/// generated model. TTS failure degrades to a text-only response.
pub async fn generate_model_summary(
    State(state): State<AppState>,
    Json(req): Json<SummaryRequest>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let speech = state
        .speech
        .as_ref()
        .ok_or_else(|| ApiError::not_configured("ELEVENLABS_API_KEY"))?;

    let scad_code = req
        .scad_code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| ApiError::bad_request("scad_code is required"))?;

    let summary = state
        .orchestrator
        .model_summary(&scad_code, req.user_prompt.as_deref())
        .await;

    match speech.synthesize(&summary).await {
        Ok(audio) => Ok(Json(SummaryResponse {
            summary,
            audio_b64: Some(B64.encode(audio)),
            format: Some("mp3".to_string()),
        })),
        Err(e) => {
            warn!("summary TTS failed: {}", e);
            Ok(Json(SummaryResponse {
                summary,
                audio_b64: None,
                format: None,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tts_failure_keeps_the_sentence() {
        let (status, Json(body)) =
            narration_reply("Preparing your CAD model; generating now.".to_string(), None);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.text, "Preparing your CAD model; generating now.");
        assert_eq!(body.error.as_deref(), Some("TTS failed"));
        assert!(body.audio_b64.is_none());
        assert!(body.format.is_none());
    }

    #[test]
    fn successful_synthesis_carries_audio() {
        let (status, Json(body)) = narration_reply("ready".to_string(), Some(vec![1, 2, 3]));
        assert_eq!(status, StatusCode::OK);
        assert!(body.error.is_none());
        assert_eq!(body.format.as_deref(), Some("mp3"));
        assert_eq!(body.audio_b64.as_deref(), Some(B64.encode([1u8, 2, 3]).as_str()));
    }
}
