//! Shared HTTP access to the OpenAI-compatible API

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::Result;
use crate::config::Config;

/// HTTP client, base URL and credential shared by the three stages
#[derive(Clone)]
pub struct OpenAiApi {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<Arc<SecretString>>,
}

impl std::fmt::Debug for OpenAiApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiApi")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl OpenAiApi {
    /// Create an API handle
    ///
    /// A missing key is allowed; every call then fails with a clear message.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.map(Arc::new),
        })
    }

    /// Build from loaded configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .api_keys
            .openai
            .as_ref()
            .map(|k| SecretString::from(k.expose_secret().to_owned()));

        Self::new(
            config.openai_base_url.clone(),
            api_key,
            config.voice.request_timeout,
        )
    }

    #[must_use]
    pub const fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Full URL for an API path such as `/audio/speech`
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    #[must_use]
    pub const fn has_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// `Authorization` header value, if a key is configured
    pub(crate) fn bearer(&self) -> Option<String> {
        self.api_key
            .as_ref()
            .map(|k| format!("Bearer {}", k.expose_secret()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_OPENAI_BASE_URL;

    #[test]
    fn endpoint_joins_base_url() {
        let api =
            OpenAiApi::new("http://localhost:8000/v1/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(
            api.endpoint("/audio/transcriptions"),
            "http://localhost:8000/v1/audio/transcriptions"
        );
        assert!(!api.has_key());
        assert!(api.bearer().is_none());
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = SecretString::from("sk-secret".to_string());
        let api =
            OpenAiApi::new(DEFAULT_OPENAI_BASE_URL, Some(key), Duration::from_secs(5)).unwrap();
        let rendered = format!("{api:?}");
        assert!(!rendered.contains("sk-secret"));
        assert_eq!(api.bearer().as_deref(), Some("Bearer sk-secret"));
    }
}
