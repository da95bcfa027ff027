//! Configuration management for speechdesk
//!
//! Layering, lowest to highest: built-in defaults, the TOML file, `SPEECHDESK_*`
//! environment variables.

pub mod file;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Default chat-completion endpoint
pub const DEFAULT_TRANSLATION_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Default chat-completion model
pub const DEFAULT_TRANSLATION_MODEL: &str = "gemma2-9b-it";

/// Default sampling temperature
pub const DEFAULT_TRANSLATION_TEMPERATURE: f32 = 0.6;

/// Short-audio recognition endpoint template
pub const DEFAULT_RECOGNITION_ENDPOINT: &str = "https://{region}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1";

/// Voice list endpoint template
pub const DEFAULT_VOICES_ENDPOINT: &str =
    "https://{region}.tts.speech.microsoft.com/cognitiveservices/voices/list";

/// Synthesis endpoint template
pub const DEFAULT_SYNTHESIS_ENDPOINT: &str =
    "https://{region}.tts.speech.microsoft.com/cognitiveservices/v1";

/// Token issuing endpoint template
pub const DEFAULT_TOKEN_ENDPOINT: &str =
    "https://{region}.api.cognitive.microsoft.com/sts/v1.0/issueToken";

/// 24kHz MP3 at a higher bitrate; lower bitrates produce audible beeps on some decoders
pub const DEFAULT_OUTPUT_FORMAT: &str = "audio-24khz-160kbitrate-mono-mp3";

/// Message surfaced when a voice catalog or synthesis request fails
pub const DEFAULT_RETRY_MESSAGE: &str = "Something went wrong. Please try again.";

/// speechdesk configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the settings database
    pub data_dir: PathBuf,

    /// Translation gateway configuration
    pub translation: TranslationConfig,

    /// Recognition configuration
    pub recognition: RecognitionConfig,

    /// TTS configuration
    pub tts: TtsConfig,
}

/// How the prompt and the recognized text are laid out in the chat request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptLayout {
    /// Prompt as the system turn, recognized text as the user turn
    #[default]
    SystemAndUser,
    /// Prompt, text and vocabulary hint concatenated into one user turn
    SingleTurn,
}

impl PromptLayout {
    /// Parse a layout name ("system" or "single")
    ///
    /// # Errors
    ///
    /// Returns error for unknown names
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "system" | "system-user" | "system_and_user" => Ok(Self::SystemAndUser),
            "single" | "single-turn" | "single_turn" => Ok(Self::SingleTurn),
            other => Err(Error::Config(format!("unknown prompt layout: {other}"))),
        }
    }
}

/// Translation gateway configuration
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    /// Chat-completion endpoint URL
    pub endpoint: String,

    /// Model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Prompt layout
    pub layout: PromptLayout,

    /// Vocabulary hint for single-turn prompts
    pub vocabulary: Option<String>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_TRANSLATION_ENDPOINT.to_string(),
            model: DEFAULT_TRANSLATION_MODEL.to_string(),
            temperature: DEFAULT_TRANSLATION_TEMPERATURE,
            layout: PromptLayout::SystemAndUser,
            vocabulary: None,
        }
    }
}

/// Recognition configuration
#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    /// Endpoint template (`{region}` is substituted)
    pub endpoint: String,

    /// RMS energy above which a chunk counts as speech
    pub energy_threshold: f32,

    /// Trailing silence that ends an utterance
    pub silence: Duration,

    /// Interval between interim transcriptions of the utterance in progress
    pub interim_interval: Option<Duration>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_RECOGNITION_ENDPOINT.to_string(),
            energy_threshold: 0.03,
            silence: Duration::from_millis(700),
            interim_interval: None,
        }
    }
}

/// TTS configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Voice list endpoint template
    pub voices_endpoint: String,

    /// Synthesis endpoint template
    pub synthesis_endpoint: String,

    /// Token issuing endpoint template
    pub token_endpoint: String,

    /// `X-Microsoft-OutputFormat` header value
    pub output_format: String,

    /// Marker appended to preview voice labels
    pub preview_marker: String,

    /// Message surfaced on failure
    pub retry_message: String,

    /// Default utterance text per locale or locale prefix, with a "default" fallback
    pub default_texts: BTreeMap<String, String>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            voices_endpoint: DEFAULT_VOICES_ENDPOINT.to_string(),
            synthesis_endpoint: DEFAULT_SYNTHESIS_ENDPOINT.to_string(),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            preview_marker: "Preview".to_string(),
            retry_message: DEFAULT_RETRY_MESSAGE.to_string(),
            default_texts: default_texts(),
        }
    }
}

fn default_texts() -> BTreeMap<String, String> {
    [
        (
            "default",
            "You can replace this text with any text you wish. You can either write in this text box or paste your own text here.",
        ),
        ("de", "Sie können diesen Text durch einen beliebigen Text ersetzen."),
        ("es", "Puede reemplazar este texto con cualquier texto que desee."),
        ("fr", "Vous pouvez remplacer ce texte par le texte de votre choix."),
        ("ja", "このテキストは、任意のテキストに置き換えることができます。"),
        ("zh", "您可以将此文本替换为所需的任何文本。"),
        ("zh-TW", "您可以將此文字取代為任何您想要的文字。"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Substitute `{region}` in an endpoint template
#[must_use]
pub fn region_url(template: &str, region: &str) -> String {
    template.replace("{region}", region.trim())
}

impl Config {
    /// Load configuration from the standard config file and the environment
    ///
    /// # Errors
    ///
    /// Returns error if an override has an invalid value
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        let config = Self::from_sources(fc, |name| std::env::var(name).ok())?;

        if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
            tracing::warn!(
                path = %config.data_dir.display(),
                error = %e,
                "failed to create data directory"
            );
        }

        Ok(config)
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if an override has an invalid value
    pub fn from_sources(
        fc: file::SpeechdeskConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        // Data directory (~/.local/share/speechdesk on Linux)
        let data_dir = env("SPEECHDESK_DATA_DIR")
            .or(fc.data_dir)
            .map_or_else(default_data_dir, PathBuf::from);

        // Translation (env > toml > default)
        let defaults = TranslationConfig::default();
        let temperature = match env("SPEECHDESK_TRANSLATION_TEMPERATURE") {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::Config(format!("invalid temperature: {raw}")))?,
            None => fc.translation.temperature.unwrap_or(defaults.temperature),
        };
        let layout = env("SPEECHDESK_PROMPT_LAYOUT")
            .or(fc.translation.prompt_layout)
            .map(|s| PromptLayout::parse(&s))
            .transpose()?
            .unwrap_or_default();
        let translation = TranslationConfig {
            endpoint: env("SPEECHDESK_TRANSLATION_URL")
                .or(fc.translation.endpoint)
                .unwrap_or(defaults.endpoint),
            model: env("SPEECHDESK_TRANSLATION_MODEL")
                .or(fc.translation.model)
                .unwrap_or(defaults.model),
            temperature,
            layout,
            vocabulary: env("SPEECHDESK_VOCABULARY")
                .or(fc.translation.vocabulary)
                .filter(|v| !v.trim().is_empty()),
        };

        let defaults = RecognitionConfig::default();
        let recognition = RecognitionConfig {
            endpoint: env("SPEECHDESK_RECOGNITION_URL")
                .or(fc.recognition.endpoint)
                .unwrap_or(defaults.endpoint),
            energy_threshold: fc
                .recognition
                .energy_threshold
                .unwrap_or(defaults.energy_threshold),
            silence: fc
                .recognition
                .silence_ms
                .map_or(defaults.silence, Duration::from_millis),
            interim_interval: match fc.recognition.interim_ms {
                Some(0) => None,
                Some(ms) => Some(Duration::from_millis(ms)),
                None => defaults.interim_interval,
            },
        };

        let defaults = TtsConfig::default();
        let mut default_texts = defaults.default_texts;
        default_texts.extend(fc.tts.default_texts);
        let tts = TtsConfig {
            voices_endpoint: fc.tts.voices_endpoint.unwrap_or(defaults.voices_endpoint),
            synthesis_endpoint: fc
                .tts
                .synthesis_endpoint
                .unwrap_or(defaults.synthesis_endpoint),
            token_endpoint: fc.tts.token_endpoint.unwrap_or(defaults.token_endpoint),
            output_format: fc.tts.output_format.unwrap_or(defaults.output_format),
            preview_marker: fc.tts.preview_marker.unwrap_or(defaults.preview_marker),
            retry_message: fc.tts.retry_message.unwrap_or(defaults.retry_message),
            default_texts,
        };

        Ok(Self {
            data_dir,
            translation,
            recognition,
            tts,
        })
    }

    /// Path of the settings database
    #[must_use]
    pub fn settings_db_path(&self) -> PathBuf {
        self.data_dir.join("settings.db")
    }
}

/// Default data directory: `~/.local/share/speechdesk`
fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".local/share/speechdesk"),
        |d| d.data_dir().join("speechdesk"),
    )
}
