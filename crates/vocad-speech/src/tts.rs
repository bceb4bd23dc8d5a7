use futures_util::StreamExt;
use serde_json::json;
use tracing::debug;

use crate::{SpeechClient, SpeechError, TTS_MODEL, TTS_OUTPUT_FORMAT, TTS_VOICE};

impl SpeechClient {
    /// Synthesize `text` with the fixed voice and output format. The
    /// provider streams the mp3 body; chunks are collected into one
    /// contiguous buffer.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let url = format!(
            "{}/v1/text-to-speech/{}?output_format={}",
            self.base_url, TTS_VOICE, TTS_OUTPUT_FORMAT
        );

        let resp = self
            .http
            .post(url)
            .header("xi-api-key", &self.api_key)
            .json(&json!({
                "text": text,
                "model_id": TTS_MODEL,
            }))
            .send()
            .await?;

        let resp = Self::check_status(resp).await?;

        let mut audio = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            audio.extend_from_slice(&chunk?);
        }

        debug!("synthesized {} bytes of audio", audio.len());
        Ok(audio)
    }
}
