//! Azure text-to-speech REST synthesis

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::SpeechSynthesizer;
use crate::config::{TtsConfig, region_url};
use crate::{Error, Result};

/// How requests to the synthesis endpoint are authorized
#[derive(Debug)]
pub enum SynthesisAuth {
    /// `Authorization: Bearer …` with an issued token
    Token(SecretString),
    /// `Ocp-Apim-Subscription-Key` with the raw key
    SubscriptionKey(SecretString),
}

/// Synthesizes SSML through the regional `cognitiveservices/v1` endpoint
pub struct AzureSynthesizer {
    client: reqwest::Client,
    url: String,
    output_format: String,
    auth: SynthesisAuth,
}

impl AzureSynthesizer {
    /// Create a synthesizer for one region
    #[must_use]
    pub fn new(config: &TtsConfig, region: &str, auth: SynthesisAuth) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: region_url(&config.synthesis_endpoint, region),
            output_format: config.output_format.clone(),
            auth,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for AzureSynthesizer {
    async fn speak_ssml(&self, ssml: &str) -> Result<Vec<u8>> {
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", &self.output_format)
            .header("User-Agent", env!("CARGO_PKG_NAME"));
        request = match &self.auth {
            SynthesisAuth::Token(token) => request.bearer_auth(token.expose_secret()),
            SynthesisAuth::SubscriptionKey(key) => {
                request.header("Ocp-Apim-Subscription-Key", key.expose_secret())
            }
        };

        tracing::debug!(ssml_len = ssml.len(), format = %self.output_format, "starting synthesis");

        let response = request.body(ssml.to_string()).send().await.map_err(|e| {
            tracing::error!(error = %e, "synthesis request failed");
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "synthesis API error");
            return Err(Error::Tts(format!("API error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(audio_bytes = audio.len(), "synthesis complete");
        Ok(audio.to_vec())
    }
}
