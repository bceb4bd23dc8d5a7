use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Transcribe --

/// Response envelope for POST /api/transcribe. The same shape is used for
/// the plain-transcript, chained-generate and chained-iterate outcomes;
/// fields that do not apply stay null.
#[derive(Debug, Default, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    pub model_id: Option<String>,
    pub scad_code: Option<String>,
    pub chained_generation: bool,
    pub status_text: Option<String>,
    pub status_audio_b64: Option<String>,
    pub status_audio_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(rename = "async", skip_serializing_if = "Option::is_none")]
    pub r#async: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// -- Iterate --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IterateRequest {
    pub userid: Option<String>,
    pub modelid: Option<String>,
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IterateResponse {
    pub success: bool,
    pub scad_code: String,
}

// -- Status narration --

#[derive(Debug, Deserialize)]
pub struct NarrationQuery {
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NarrationResponse {
    pub text: String,
    pub audio_b64: Option<String>,
    pub format: Option<String>,
    /// Set when synthesis failed; the sentence is still returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// -- Model summary --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SummaryRequest {
    pub scad_code: Option<String>,
    #[serde(default)]
    pub user_prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: String,
    pub audio_b64: Option<String>,
    pub format: Option<String>,
}

// -- Image-to-3D --

#[derive(Debug, Serialize)]
pub struct ShapeResponse {
    pub success: bool,
    pub model_url: Option<String>,
}

// -- Health --

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterate_request_rejects_unknown_fields() {
        let err = serde_json::from_str::<IterateRequest>(
            r#"{"userid":"u1","modelid":"m1","prompt":"wider base","extra":1}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn summary_request_rejects_unknown_fields() {
        let err = serde_json::from_str::<SummaryRequest>(
            r#"{"scad_code":"cube(1);","voice":"other"}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn summary_request_user_prompt_is_optional() {
        let req: SummaryRequest =
            serde_json::from_str(r#"{"scad_code":"cube(1);"}"#).unwrap();
        assert!(req.user_prompt.is_none());
    }
}
