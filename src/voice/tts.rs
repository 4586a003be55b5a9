//! Text-to-speech (TTS) stage

use async_trait::async_trait;

use super::upstream::OpenAiApi;
use crate::error::Stage;
use crate::{Error, Result};

/// Text-to-speech capability
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize reply text into audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if the upstream service fails
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Synthesizes speech through the `OpenAI` speech API
pub struct SpeechSynthesizer {
    api: OpenAiApi,
    model: String,
    voice: String,
    speed: f32,
}

impl SpeechSynthesizer {
    #[must_use]
    pub const fn new(api: OpenAiApi, model: String, voice: String, speed: f32) -> Self {
        Self {
            api,
            model,
            voice,
            speed,
        }
    }
}

#[derive(serde::Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
}

#[async_trait]
impl Synthesizer for SpeechSynthesizer {
    /// Returns MP3 audio
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let bearer = self
            .api
            .bearer()
            .ok_or_else(|| Error::upstream(Stage::Synthesize, "OpenAI API key not configured"))?;

        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .api
            .client()
            .post(self.api.endpoint("/audio/speech"))
            .header("Authorization", bearer)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::upstream(Stage::Synthesize, format!("TTS request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                Stage::Synthesize,
                format!("TTS API error {status}: {body}"),
            ));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::upstream(Stage::Synthesize, e.to_string()))?;

        tracing::debug!(audio_bytes = audio.len(), voice = %self.voice, "synthesis complete");
        Ok(audio.to_vec())
    }

    fn name(&self) -> &'static str {
        "openai-tts"
    }
}
