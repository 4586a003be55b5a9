//! TOML configuration file loading
//!
//! Supports `~/.config/voicestream/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct GatewayConfigFile {
    /// Upstream API configuration
    #[serde(default)]
    pub openai: OpenAiFileConfig,

    /// Voice pipeline configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Upstream API configuration
#[derive(Debug, Default, Deserialize)]
pub struct OpenAiFileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Voice pipeline configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// Chat model (e.g. "gpt-3.5-turbo")
    pub llm_model: Option<String>,

    /// System instruction sent with every transcript
    pub system_prompt: Option<String>,

    /// Reply used when the chat model returns nothing
    pub fallback_reply: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,

    /// Chunks smaller than this many bytes are not sent upstream
    pub min_chunk_bytes: Option<usize>,

    /// Directory for transcription staging files
    pub staging_dir: Option<String>,

    /// "recreate" or "reject"
    pub unknown_session: Option<String>,

    /// Per-request timeout for upstream calls
    pub request_timeout_secs: Option<u64>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// HTTP/WebSocket port
    pub port: Option<u16>,

    /// Static files for the browser client
    pub static_dir: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `GatewayConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> GatewayConfigFile {
    config_file_path().map_or_else(GatewayConfigFile::default, |path| load_from(&path))
}

/// Parse config file contents
///
/// # Errors
///
/// Returns [`crate::Error::Toml`] if `content` is not a valid config file
pub fn parse(content: &str) -> Result<GatewayConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load a TOML config file from an explicit path, falling back to defaults
pub fn load_from(path: &Path) -> GatewayConfigFile {
    if !path.exists() {
        return GatewayConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match parse(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                GatewayConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            GatewayConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voicestream/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.config_dir().join("voicestream").join("config.toml"))
}
