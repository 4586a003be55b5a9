//! Conversational reply stage

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::upstream::OpenAiApi;
use crate::error::Stage;
use crate::{Error, Result};

/// Instruction sent ahead of every transcript
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Reply used when the model returns no content
pub const DEFAULT_FALLBACK_REPLY: &str = "申し訳ありません。聞き取れませんでした。";

/// Conversational text capability
#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce a reply to the user's transcribed speech
    ///
    /// `Ok(None)` means the model answered with no content.
    ///
    /// # Errors
    ///
    /// Returns error if the upstream service fails
    async fn respond(&self, text: &str) -> Result<Option<String>>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Chat completion via the `OpenAI` API
pub struct ChatResponder {
    api: OpenAiApi,
    model: String,
    system_prompt: String,
}

impl ChatResponder {
    #[must_use]
    pub const fn new(api: OpenAiApi, model: String, system_prompt: String) -> Self {
        Self {
            api,
            model,
            system_prompt,
        }
    }
}

#[async_trait]
impl Responder for ChatResponder {
    async fn respond(&self, text: &str) -> Result<Option<String>> {
        let bearer = self
            .api
            .bearer()
            .ok_or_else(|| Error::upstream(Stage::Respond, "OpenAI API key not configured"))?;

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: &self.system_prompt,
                },
                Message {
                    role: "user",
                    content: text,
                },
            ],
        };

        let response = self
            .api
            .client()
            .post(self.api.endpoint("/chat/completions"))
            .header("Authorization", bearer)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::upstream(Stage::Respond, format!("chat request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(
                Stage::Respond,
                format!("chat API error {status}: {body}"),
            ));
        }

        let result: ChatCompletionResponse = response.json().await.map_err(|e| {
            Error::upstream(Stage::Respond, format!("failed to parse chat response: {e}"))
        })?;

        Ok(result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content))
    }

    fn name(&self) -> &'static str {
        "openai-chat"
    }
}

/// Turn a model answer into reply text, never empty
#[must_use]
pub fn reply_or_fallback(answer: Option<String>, fallback: &str) -> String {
    match answer {
        Some(text) if !text.trim().is_empty() => text,
        _ => fallback.to_string(),
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
