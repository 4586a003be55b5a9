//! Configuration management for the voice stream gateway
//!
//! Precedence is environment > `config.toml` > built-in defaults.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::voice::{
    DEFAULT_FALLBACK_REPLY, DEFAULT_SYSTEM_PROMPT, MIN_CHUNK_BYTES, UnknownSessionPolicy,
};
use crate::{Error, Result};

use file::GatewayConfigFile;

/// Default port, matching the browser client's expectation
pub const DEFAULT_PORT: u16 = 4000;

/// Default OpenAI-compatible API base URL
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Gateway configuration
#[derive(Debug)]
pub struct Config {
    /// API keys
    pub api_keys: ApiKeys,

    /// Base URL of the OpenAI-compatible API
    pub openai_base_url: String,

    /// HTTP API server configuration
    pub api_server: ApiServerConfig,

    /// Voice pipeline configuration
    pub voice: VoiceConfig,
}

/// API keys for external services
#[derive(Debug, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper, chat completions and TTS)
    pub openai: Option<SecretString>,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Path to static files directory (browser client)
    pub static_dir: Option<PathBuf>,
}

/// Voice pipeline configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// Chat completion model
    pub llm_model: String,

    /// System instruction sent with every transcript
    pub system_prompt: String,

    /// Reply substituted when the chat model returns no content
    pub fallback_reply: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,

    /// Minimum chunk size in bytes before anything is sent upstream
    pub min_chunk_bytes: usize,

    /// Directory for transcription staging files (system temp dir when unset)
    pub staging_dir: Option<PathBuf>,

    /// What to do with a chunk for a client that has no open stream
    pub unknown_session: UnknownSessionPolicy,

    /// Per-request timeout for upstream calls
    pub request_timeout: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stt_model: "whisper-1".to_string(),
            llm_model: "gpt-3.5-turbo".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
            min_chunk_bytes: MIN_CHUNK_BYTES,
            staging_dir: None,
            unknown_session: UnknownSessionPolicy::default(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Load configuration from the environment and the standard config file
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is out of range or unparseable
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is out of range or unparseable
    pub fn from_sources<F>(fc: GatewayConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = VoiceConfig::default();

        // API keys (env > toml > None); empty strings count as unset
        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY")
                .or(fc.openai.api_key)
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from),
        };

        let openai_base_url = env("OPENAI_BASE_URL")
            .or(fc.openai.base_url)
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        // API server config (env > toml > default)
        let port = match env("VOICESTREAM_PORT").or_else(|| env("PORT")) {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::Config(format!("invalid port: {raw}")))?,
            None => fc.server.port.unwrap_or(DEFAULT_PORT),
        };
        let api_server = ApiServerConfig {
            port,
            static_dir: env("VOICESTREAM_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
        };

        let unknown_session = env("VOICESTREAM_UNKNOWN_SESSION")
            .or(fc.voice.unknown_session)
            .map(|s| s.parse::<UnknownSessionPolicy>())
            .transpose()?
            .unwrap_or(defaults.unknown_session);

        let voice = VoiceConfig {
            stt_model: env("VOICESTREAM_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or(defaults.stt_model),
            llm_model: env("VOICESTREAM_LLM_MODEL")
                .or(fc.voice.llm_model)
                .unwrap_or(defaults.llm_model),
            system_prompt: env("VOICESTREAM_SYSTEM_PROMPT")
                .or(fc.voice.system_prompt)
                .unwrap_or(defaults.system_prompt),
            fallback_reply: fc.voice.fallback_reply.unwrap_or(defaults.fallback_reply),
            tts_model: env("VOICESTREAM_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or(defaults.tts_model),
            tts_voice: env("VOICESTREAM_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or(defaults.tts_voice),
            tts_speed: fc.voice.tts_speed.unwrap_or(defaults.tts_speed),
            min_chunk_bytes: fc.voice.min_chunk_bytes.unwrap_or(defaults.min_chunk_bytes),
            staging_dir: env("VOICESTREAM_STAGING_DIR")
                .or(fc.voice.staging_dir)
                .map(PathBuf::from),
            unknown_session,
            request_timeout: fc
                .voice
                .request_timeout_secs
                .map_or(defaults.request_timeout, Duration::from_secs),
        };

        if !(0.25..=4.0).contains(&voice.tts_speed) {
            return Err(Error::Config(format!(
                "tts_speed must be between 0.25 and 4.0, got {}",
                voice.tts_speed
            )));
        }

        if voice.fallback_reply.trim().is_empty() {
            return Err(Error::Config("fallback_reply must not be empty".to_string()));
        }

        Ok(Self {
            api_keys,
            openai_base_url,
            api_server,
            voice,
        })
    }

    /// Whether an upstream API key is configured
    #[must_use]
    pub const fn has_api_key(&self) -> bool {
        self.api_keys.openai.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_any_source() {
        let config = Config::from_sources(GatewayConfigFile::default(), env_from(&[])).unwrap();

        assert!(!config.has_api_key());
        assert_eq!(config.api_server.port, DEFAULT_PORT);
        assert_eq!(config.openai_base_url, DEFAULT_OPENAI_BASE_URL);
        assert_eq!(config.voice.stt_model, "whisper-1");
        assert_eq!(config.voice.llm_model, "gpt-3.5-turbo");
        assert_eq!(config.voice.tts_model, "tts-1");
        assert_eq!(config.voice.tts_voice, "alloy");
        assert_eq!(config.voice.min_chunk_bytes, 4000);
        assert_eq!(config.voice.unknown_session, UnknownSessionPolicy::Recreate);
    }

    #[test]
    fn env_overrides_file() {
        let mut fc = GatewayConfigFile::default();
        fc.server.port = Some(9000);
        fc.voice.tts_voice = Some("nova".to_string());

        let config = Config::from_sources(
            fc,
            env_from(&[("PORT", "8080"), ("OPENAI_API_KEY", "sk-test")]),
        )
        .unwrap();

        assert_eq!(config.api_server.port, 8080);
        assert_eq!(config.voice.tts_voice, "nova");
        assert_eq!(
            config.api_keys.openai.as_ref().map(ExposeSecret::expose_secret),
            Some("sk-test")
        );
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let env = env_from(&[("OPENAI_API_KEY", "  ")]);
        let config = Config::from_sources(GatewayConfigFile::default(), env).unwrap();
        assert!(!config.has_api_key());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = Config::from_sources(
            GatewayConfigFile::default(),
            env_from(&[("OPENAI_BASE_URL", "http://localhost:8000/v1/")]),
        )
        .unwrap();
        assert_eq!(config.openai_base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn invalid_port_is_rejected() {
        let env = env_from(&[("PORT", "eighty")]);
        let result = Config::from_sources(GatewayConfigFile::default(), env);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn out_of_range_speed_is_rejected() {
        let mut fc = GatewayConfigFile::default();
        fc.voice.tts_speed = Some(9.0);
        assert!(Config::from_sources(fc, env_from(&[])).is_err());
    }

    #[test]
    fn unknown_session_policy_from_env() {
        let config = Config::from_sources(
            GatewayConfigFile::default(),
            env_from(&[("VOICESTREAM_UNKNOWN_SESSION", "reject")]),
        )
        .unwrap();
        assert_eq!(config.voice.unknown_session, UnknownSessionPolicy::Reject);
    }
}
