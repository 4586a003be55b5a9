//! Voice stream processing
//!
//! Each client streams recorded chunks; every chunk runs through
//! validation, format resolution, transcription, a chat reply and speech
//! synthesis. [`SessionManager`] owns the per-client lifecycle.

mod chat;
mod chunk;
pub mod format;
mod pipeline;
mod session;
mod staging;
mod stt;
mod tts;
mod upstream;

pub use chat::{
    ChatResponder, DEFAULT_FALLBACK_REPLY, DEFAULT_SYSTEM_PROMPT, Responder, reply_or_fallback,
};
pub use chunk::{
    AudioChunk, ChunkValidator, ChunkVerdict, MIN_CHUNK_BYTES, RejectReason, SHORT_CHUNK_NOTICE,
};
pub use format::{DEFAULT_MIME_TYPE, resolve as resolve_format};
pub use pipeline::{PipelineResult, VoicePipeline};
pub use session::{
    Session, SessionInfo, SessionManager, SessionRegistry, SessionState, UnknownSessionPolicy,
};
pub use staging::{StagedAudio, StagingArea};
pub use stt::{Transcriber, WhisperTranscriber, transcribe_buffer};
pub use tts::{SpeechSynthesizer, Synthesizer};
pub use upstream::OpenAiApi;
