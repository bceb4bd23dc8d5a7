pub mod stt;
pub mod tts;

use tracing::warn;

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";

/// Fixed provider parameters, matching what the frontend expects back.
pub(crate) const STT_MODEL: &str = "scribe_v1";
pub(crate) const STT_LANGUAGE: &str = "eng";
pub(crate) const TTS_VOICE: &str = "IKne3meq5aSn9XLyUdCD";
pub(crate) const TTS_MODEL: &str = "eleven_multilingual_v2";
pub(crate) const TTS_OUTPUT_FORMAT: &str = "mp3_44100_128";

#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("speech request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("speech service returned {status}: {body}")]
    Upstream { status: u16, body: String },
}

/// Client for the hosted speech provider: speech-to-text in `stt`,
/// text-to-speech in `tts`.
pub struct SpeechClient {
    pub(crate) http: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) base_url: String,
}

impl SpeechClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Build from `ELEVENLABS_API_KEY`. `None` means the speech endpoints
    /// degrade to a "not configured" response instead of failing per call.
    pub fn from_env() -> Option<Self> {
        match std::env::var("ELEVENLABS_API_KEY") {
            Ok(key) if !key.is_empty() => Some(Self::new(key)),
            _ => {
                warn!("ELEVENLABS_API_KEY not set; speech endpoints will return 501");
                None
            }
        }
    }

    pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, SpeechError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(SpeechError::Upstream {
            status: status.as_u16(),
            body,
        })
    }
}
