//! Voice stream gateway - spoken conversations over a WebSocket
//!
//! A browser client streams recorded audio chunks; each chunk is
//! transcribed, answered by a chat model and synthesized back to speech.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              Browser client (WebSocket)              │
//! └────────────────────┬────────────────────────────────┘
//!                      │ startStream / voiceChunk / endStream
//! ┌────────────────────▼────────────────────────────────┐
//! │   SessionManager  ─►  SessionRegistry               │
//! │        │                                            │
//! │   VoicePipeline: validate ─► format ─► STT ─► chat ─► TTS
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │        OpenAI-compatible API (Whisper, chat, TTS)    │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result, Stage};
pub use voice::{
    AudioChunk, PipelineResult, Responder, SessionManager, SessionRegistry, SessionState,
    Synthesizer, Transcriber, UnknownSessionPolicy, VoicePipeline,
};
