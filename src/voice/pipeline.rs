//! Per-chunk voice pipeline
//!
//! ```text
//! validate ─► resolve format ─► transcribe ─► respond ─► synthesize
//! ```
//!
//! Stages run strictly in sequence. A failing stage aborts the rest of the
//! pass for that chunk only.

use std::sync::Arc;

use super::DEFAULT_FALLBACK_REPLY;
use super::chat::{ChatResponder, Responder, reply_or_fallback};
use super::chunk::{AudioChunk, ChunkValidator, ChunkVerdict, RejectReason, SHORT_CHUNK_NOTICE};
use super::format;
use super::staging::StagingArea;
use super::stt::{Transcriber, WhisperTranscriber, transcribe_buffer};
use super::tts::{SpeechSynthesizer, Synthesizer};
use super::upstream::OpenAiApi;
use crate::error::Stage;
use crate::{Config, Error, Result};

/// Reply audio and text for one chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineResult {
    /// Synthesized reply audio (empty for advisory results)
    pub audio: Vec<u8>,
    /// Reply text
    pub text: String,
    advisory: bool,
}

impl PipelineResult {
    /// Result of a full pass through every stage
    #[must_use]
    pub fn answered(audio: Vec<u8>, text: impl Into<String>) -> Self {
        Self {
            audio,
            text: text.into(),
            advisory: false,
        }
    }

    /// Text-only result that skipped the upstream stages
    #[must_use]
    pub fn advisory(text: impl Into<String>) -> Self {
        Self {
            audio: Vec::new(),
            text: text.into(),
            advisory: true,
        }
    }

    /// Whether the chunk was turned away before any upstream call
    #[must_use]
    pub const fn is_advisory(&self) -> bool {
        self.advisory
    }
}

/// The three upstream stages plus the local checks in front of them
pub struct VoicePipeline {
    validator: ChunkValidator,
    staging: StagingArea,
    transcriber: Arc<dyn Transcriber>,
    responder: Arc<dyn Responder>,
    synthesizer: Arc<dyn Synthesizer>,
    fallback_reply: String,
}

impl VoicePipeline {
    /// Create a pipeline with default validation and staging settings
    #[must_use]
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        responder: Arc<dyn Responder>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        Self {
            validator: ChunkValidator::default(),
            staging: StagingArea::default(),
            transcriber,
            responder,
            synthesizer,
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
        }
    }

    /// Build the `OpenAI`-backed pipeline described by `config`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built or the staging
    /// directory cannot be created
    pub fn from_config(config: &Config) -> Result<Self> {
        let api = OpenAiApi::from_config(config)?;
        let voice = &config.voice;

        let transcriber = WhisperTranscriber::new(api.clone(), voice.stt_model.clone());
        let responder = ChatResponder::new(
            api.clone(),
            voice.llm_model.clone(),
            voice.system_prompt.clone(),
        );
        let synthesizer = SpeechSynthesizer::new(
            api,
            voice.tts_model.clone(),
            voice.tts_voice.clone(),
            voice.tts_speed,
        );

        let staging = match &voice.staging_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                StagingArea::new(dir.clone())
            }
            None => StagingArea::default(),
        };

        Ok(Self::new(
            Arc::new(transcriber),
            Arc::new(responder),
            Arc::new(synthesizer),
        )
        .with_validator(ChunkValidator::new(voice.min_chunk_bytes))
        .with_staging(staging)
        .with_fallback_reply(voice.fallback_reply.clone()))
    }

    #[must_use]
    pub const fn with_validator(mut self, validator: ChunkValidator) -> Self {
        self.validator = validator;
        self
    }

    #[must_use]
    pub fn with_staging(mut self, staging: StagingArea) -> Self {
        self.staging = staging;
        self
    }

    #[must_use]
    pub fn with_fallback_reply(mut self, reply: impl Into<String>) -> Self {
        self.fallback_reply = reply.into();
        self
    }

    #[must_use]
    pub const fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Run one chunk through every stage
    ///
    /// A chunk under the size threshold is not an error: it yields
    /// [`SHORT_CHUNK_NOTICE`] with empty audio and calls nothing upstream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`], [`Error::TranscriptionFailed`]
    /// or [`Error::Upstream`] from the first stage that fails
    pub async fn process(&self, chunk: &AudioChunk) -> Result<PipelineResult> {
        if let ChunkVerdict::Rejected(RejectReason::TooShort { len, min }) =
            self.validator.validate(&chunk.data)
        {
            tracing::warn!(
                bytes = len,
                min_bytes = min,
                "audio chunk too small, skipping"
            );
            return Ok(PipelineResult::advisory(SHORT_CHUNK_NOTICE));
        }

        let extension = format::resolve(&chunk.mime_type)?;
        tracing::debug!(mime_type = %chunk.mime_type, extension, "resolved audio container");

        let transcript = transcribe_buffer(
            self.transcriber.as_ref(),
            &self.staging,
            &chunk.data,
            extension,
        )
        .await?;
        tracing::info!(
            transcriber = self.transcriber.name(),
            transcript = %transcript,
            "transcribed chunk"
        );

        let answer = self
            .responder
            .respond(&transcript)
            .await
            .map_err(|e| attribute(e, Stage::Respond))?;
        let reply = reply_or_fallback(answer, &self.fallback_reply);
        tracing::info!(responder = self.responder.name(), reply = %reply, "generated reply");

        let audio = self
            .synthesizer
            .synthesize(&reply)
            .await
            .map_err(|e| attribute(e, Stage::Synthesize))?;
        tracing::debug!(
            synthesizer = self.synthesizer.name(),
            audio_bytes = audio.len(),
            "synthesized reply"
        );

        Ok(PipelineResult::answered(audio, reply))
    }
}

/// Make sure a backend error carries the stage it came from
fn attribute(err: Error, stage: Stage) -> Error {
    if err.stage() == Some(stage) {
        err
    } else {
        Error::upstream(stage, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_keeps_matching_stage() {
        let err = attribute(Error::upstream(Stage::Respond, "boom"), Stage::Respond);
        assert_eq!(err.to_string(), "respond failed: boom");
    }

    #[test]
    fn attribute_wraps_foreign_errors() {
        let err = attribute(Error::Config("nope".to_string()), Stage::Synthesize);
        assert_eq!(err.stage(), Some(Stage::Synthesize));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn advisory_has_no_audio() {
        let result = PipelineResult::advisory(SHORT_CHUNK_NOTICE);
        assert!(result.audio.is_empty());
        assert_eq!(result.text, SHORT_CHUNK_NOTICE);
        assert!(result.is_advisory());
        assert!(!PipelineResult::answered(vec![1], "Hi there!").is_advisory());
    }
}
