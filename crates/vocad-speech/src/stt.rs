use bytes::Bytes;
use reqwest::multipart;
use serde::Deserialize;
use tracing::debug;

use crate::{SpeechClient, SpeechError, STT_LANGUAGE, STT_MODEL};

#[derive(Debug, Deserialize)]
pub(crate) struct Transcription {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub utterances: Option<Vec<Utterance>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Utterance {
    #[serde(default)]
    pub text: Option<String>,
}

impl SpeechClient {
    /// Send audio to the speech-to-text endpoint and merge the tagged
    /// utterances into one trimmed transcript.
    pub async fn transcribe(&self, audio: Bytes, filename_hint: &str) -> Result<String, SpeechError> {
        let filename = if filename_hint.is_empty() {
            "audio.webm".to_string()
        } else {
            filename_hint.to_string()
        };

        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(audio.to_vec()).file_name(filename))
            .text("model_id", STT_MODEL)
            .text("language_code", STT_LANGUAGE)
            .text("tag_audio_events", "true")
            .text("diarize", "true");

        let resp = self
            .http
            .post(format!("{}/v1/speech-to-text", self.base_url))
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let resp = Self::check_status(resp).await?;
        let tr: Transcription = resp.json().await?;
        let text = merge_transcript(tr);
        debug!("transcribed {} chars", text.len());
        Ok(text)
    }
}

/// Concatenate non-empty utterance texts; fall back to the flat `text`
/// field when the provider returns no utterances.
pub(crate) fn merge_transcript(tr: Transcription) -> String {
    if let Some(utterances) = tr.utterances {
        let merged = utterances
            .into_iter()
            .filter_map(|u| u.text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !merged.trim().is_empty() {
            return merged.trim().to_string();
        }
    }
    tr.text.unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utterance(text: &str) -> Utterance {
        Utterance {
            text: Some(text.to_string()),
        }
    }

    #[test]
    fn merges_nonempty_utterances() {
        let tr = Transcription {
            text: Some("ignored".into()),
            utterances: Some(vec![utterance("make me"), utterance(""), utterance("a traffic cone")]),
        };
        assert_eq!(merge_transcript(tr), "make me a traffic cone");
    }

    #[test]
    fn falls_back_to_flat_text() {
        let tr = Transcription {
            text: Some("  hello there  ".into()),
            utterances: None,
        };
        assert_eq!(merge_transcript(tr), "hello there");
    }

    #[test]
    fn empty_utterances_fall_back_to_flat_text() {
        let tr = Transcription {
            text: Some("fallback".into()),
            utterances: Some(vec![Utterance { text: None }]),
        };
        assert_eq!(merge_transcript(tr), "fallback");
    }

    #[test]
    fn empty_response_is_empty_string() {
        let tr = Transcription {
            text: None,
            utterances: None,
        };
        assert_eq!(merge_transcript(tr), "");
    }
}
