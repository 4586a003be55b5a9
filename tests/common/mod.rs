//! Shared test utilities

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use voicestream_gateway::voice::{StagedAudio, StagingArea};
use voicestream_gateway::{Error, Responder, Result, Stage, Synthesizer, Transcriber, VoicePipeline};

/// Ordered record of upstream calls made by the fakes
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Transcriber that returns a fixed transcript
pub struct FakeTranscriber {
    pub log: CallLog,
    pub transcript: String,
    pub fail: bool,
    pub delay: Duration,
    /// Extension and byte count of every staged upload
    pub uploads: Arc<Mutex<Vec<(String, usize)>>>,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: &StagedAudio) -> Result<String> {
        self.log.push("transcribe");
        self.uploads
            .lock()
            .unwrap()
            .push((audio.extension().to_string(), audio.len()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(Error::TranscriptionFailed("quota exceeded".to_string()));
        }
        Ok(self.transcript.clone())
    }

    fn name(&self) -> &'static str {
        "fake-stt"
    }
}

/// Responder that returns a fixed (possibly empty) reply
pub struct FakeResponder {
    pub log: CallLog,
    pub reply: Option<String>,
    pub fail: bool,
    pub inputs: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Responder for FakeResponder {
    async fn respond(&self, text: &str) -> Result<Option<String>> {
        self.log.push("respond");
        self.inputs.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(Error::upstream(Stage::Respond, "model overloaded"));
        }
        Ok(self.reply.clone())
    }

    fn name(&self) -> &'static str {
        "fake-chat"
    }
}

/// Synthesizer that returns fixed audio bytes
pub struct FakeSynthesizer {
    pub log: CallLog,
    pub audio: Vec<u8>,
    pub fail: bool,
    pub inputs: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.log.push("synthesize");
        self.inputs.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(Error::upstream(Stage::Synthesize, "429 Too Many Requests"));
        }
        Ok(self.audio.clone())
    }

    fn name(&self) -> &'static str {
        "fake-tts"
    }
}

/// Knobs for a fake-backed pipeline
pub struct Fakes {
    pub transcript: String,
    pub reply: Option<String>,
    pub audio: Vec<u8>,
    pub fail_transcribe: bool,
    pub fail_respond: bool,
    pub fail_synthesize: bool,
    pub transcribe_delay: Duration,
}

impl Default for Fakes {
    fn default() -> Self {
        Self {
            transcript: "hello".to_string(),
            reply: Some("Hi there!".to_string()),
            audio: b"ID3-fake-mp3".to_vec(),
            fail_transcribe: false,
            fail_respond: false,
            fail_synthesize: false,
            transcribe_delay: Duration::ZERO,
        }
    }
}

/// A pipeline wired to fakes, plus handles for inspecting what they saw
pub struct Harness {
    pub pipeline: VoicePipeline,
    pub log: CallLog,
    pub uploads: Arc<Mutex<Vec<(String, usize)>>>,
    pub llm_inputs: Arc<Mutex<Vec<String>>>,
    pub tts_inputs: Arc<Mutex<Vec<String>>>,
}

/// Build a fake-backed pipeline that stages into `staging_dir`
#[must_use]
pub fn harness(fakes: Fakes, staging_dir: &Path) -> Harness {
    let log = CallLog::default();
    let uploads = Arc::new(Mutex::new(Vec::new()));
    let llm_inputs = Arc::new(Mutex::new(Vec::new()));
    let tts_inputs = Arc::new(Mutex::new(Vec::new()));

    let transcriber = FakeTranscriber {
        log: log.clone(),
        transcript: fakes.transcript,
        fail: fakes.fail_transcribe,
        delay: fakes.transcribe_delay,
        uploads: uploads.clone(),
    };
    let responder = FakeResponder {
        log: log.clone(),
        reply: fakes.reply,
        fail: fakes.fail_respond,
        inputs: llm_inputs.clone(),
    };
    let synthesizer = FakeSynthesizer {
        log: log.clone(),
        audio: fakes.audio,
        fail: fakes.fail_synthesize,
        inputs: tts_inputs.clone(),
    };

    let pipeline = VoicePipeline::new(
        Arc::new(transcriber),
        Arc::new(responder),
        Arc::new(synthesizer),
    )
    .with_staging(StagingArea::new(staging_dir.to_path_buf()));

    Harness {
        pipeline,
        log,
        uploads,
        llm_inputs,
        tts_inputs,
    }
}

/// Number of entries left in a staging directory
#[must_use]
pub fn staged_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map_or(0, Iterator::count)
}

/// Audio payload of `len` bytes
#[must_use]
pub fn audio_bytes(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| u8::try_from(i % 251).unwrap_or_default())
        .collect()
}
