//! Chat-completion translation of recognized text
//!
//! One request per finalized utterance, no retry. Replies from reasoning models
//! may start with a `<think>` block, which is stripped before display.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::{PromptLayout, TranslationConfig};
use crate::{Error, Result};

/// Alert shown when translation is enabled without an API key
pub const MISSING_API_KEY: &str = "Please enter your Groq API Key.";

/// Alert shown when translation is enabled without a prompt
pub const MISSING_PROMPT: &str = "Please enter your LLM Prompt if you want to use Groq API.";

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<think>[\s\S]*?</think>\s*").expect("valid regex"));

/// Something that turns recognized text into a cleaned-up reply
#[async_trait]
pub trait Translator: Send + Sync {
    /// Send `text` with `prompt` and return the cleaned reply
    ///
    /// # Errors
    ///
    /// `Error::MissingInput` when the key or prompt is empty (no request is made),
    /// otherwise transport, status or parse errors
    async fn translate(&self, api_key: &SecretString, prompt: &str, text: &str)
    -> Result<String>;
}

/// Chat-completion client
pub struct TranslationGateway {
    client: reqwest::Client,
    config: TranslationConfig,
}

impl TranslationGateway {
    /// Create a new gateway
    #[must_use]
    pub fn new(config: TranslationConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Build the request body for one utterance
    #[must_use]
    pub fn build_request<'a>(&'a self, prompt: &'a str, text: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            messages: build_messages(
                self.config.layout,
                prompt,
                text,
                self.config.vocabulary.as_deref(),
            ),
            model: &self.config.model,
            temperature: self.config.temperature,
        }
    }
}

#[async_trait]
impl Translator for TranslationGateway {
    async fn translate(
        &self,
        api_key: &SecretString,
        prompt: &str,
        text: &str,
    ) -> Result<String> {
        let api_key = api_key.expose_secret().trim();
        if api_key.is_empty() {
            return Err(Error::MissingInput(MISSING_API_KEY.to_string()));
        }
        if prompt.trim().is_empty() {
            return Err(Error::MissingInput(MISSING_PROMPT.to_string()));
        }

        let request = self.build_request(prompt, text);
        tracing::debug!(model = %self.config.model, chars = text.len(), "sending translation request");

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "translation request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "translation API error");
            return Err(Error::Translation(format!("HTTP error! status: {status}")));
        }

        let reply: ChatResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse translation response");
            e
        })?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Translation("response had no reply content".to_string()))?;

        let cleaned = strip_reasoning(&content);
        tracing::info!(translation = %cleaned, "translation complete");
        Ok(cleaned)
    }
}

/// Remove the first `<think>…</think>` block and the whitespace after it
#[must_use]
pub fn strip_reasoning(reply: &str) -> String {
    THINK_BLOCK.replace(reply, "").into_owned()
}

/// Lay out the conversation turns for one utterance
#[must_use]
pub fn build_messages<'a>(
    layout: PromptLayout,
    prompt: &'a str,
    text: &'a str,
    vocabulary: Option<&str>,
) -> Vec<ChatMessage<'a>> {
    match layout {
        PromptLayout::SystemAndUser => vec![
            ChatMessage {
                role: "system",
                content: prompt.into(),
            },
            ChatMessage {
                role: "user",
                content: text.into(),
            },
        ],
        PromptLayout::SingleTurn => {
            let mut content = format!("{prompt}\n\n{text}");
            if let Some(vocabulary) = vocabulary {
                content.push_str("\n\nVocabulary that may appear in the text:\n");
                content.push_str(vocabulary);
            }
            vec![ChatMessage {
                role: "user",
                content: content.into(),
            }]
        }
    }
}

/// Chat-completion request body
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub messages: Vec<ChatMessage<'a>>,
    pub model: &'a str,
    pub temperature: f32,
}

/// One conversational turn
#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: std::borrow::Cow<'a, str>,
}

#[derive(Deserialize)]
struct ChatResponse {
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
