//! Speech-to-text (STT) stage

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use super::staging::{StagedAudio, StagingArea};
use super::upstream::OpenAiApi;
use crate::{Error, Result};

/// Speech-to-text capability
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a staged audio file to text
    ///
    /// # Errors
    ///
    /// Returns error if the upstream service fails
    async fn transcribe(&self, audio: &StagedAudio) -> Result<String>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Response from the Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes speech through the `OpenAI` Whisper API
pub struct WhisperTranscriber {
    api: OpenAiApi,
    model: String,
}

impl WhisperTranscriber {
    #[must_use]
    pub const fn new(api: OpenAiApi, model: String) -> Self {
        Self { api, model }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &StagedAudio) -> Result<String> {
        let bearer = self.api.bearer().ok_or_else(|| {
            Error::TranscriptionFailed("OpenAI API key not configured".to_string())
        })?;

        tracing::debug!(
            audio_bytes = audio.len(),
            extension = audio.extension(),
            "starting Whisper transcription"
        );

        // Stream the staged file instead of copying it into the request
        let file = tokio::fs::File::open(audio.path()).await?;
        let part = Part::stream_with_length(file, audio.len() as u64)
            .file_name(audio.upload_name());
        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        let response = self
            .api
            .client()
            .post(self.api.endpoint("/audio/transcriptions"))
            .header("Authorization", bearer)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                Error::TranscriptionFailed(e.to_string())
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::TranscriptionFailed(format!(
                "Whisper API error {status}: {body}"
            )));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Whisper response");
            Error::TranscriptionFailed(e.to_string())
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    fn name(&self) -> &'static str {
        "whisper"
    }
}

/// Stage `buffer` to disk, transcribe it, and remove the staging file
///
/// The staging file is gone by the time this returns, on every path.
///
/// # Errors
///
/// Returns [`Error::TranscriptionFailed`] if staging or transcription fails
pub async fn transcribe_buffer(
    transcriber: &dyn Transcriber,
    staging: &StagingArea,
    buffer: &[u8],
    extension: &'static str,
) -> Result<String> {
    let staged = staging
        .stage(buffer, extension)
        .map_err(|e| Error::TranscriptionFailed(format!("failed to stage audio: {e}")))?;

    let result = transcriber.transcribe(&staged).await;

    if let Err(e) = staged.remove() {
        tracing::warn!(error = %e, "failed to remove staged audio");
    }

    result.map_err(|e| match e {
        Error::TranscriptionFailed(_) => e,
        other => Error::TranscriptionFailed(other.to_string()),
    })
}
