//! TOML configuration file loading
//!
//! Supports `~/.config/speechdesk/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.
//! User preferences (keys, region, language...) live in the settings store instead.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct SpeechdeskConfigFile {
    /// Directory holding the settings database
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Chat-completion translation configuration
    #[serde(default)]
    pub translation: TranslationFileConfig,

    /// Speech recognition configuration
    #[serde(default)]
    pub recognition: RecognitionFileConfig,

    /// Text-to-speech configuration
    #[serde(default)]
    pub tts: TtsFileConfig,
}

/// Translation-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct TranslationFileConfig {
    /// Chat-completion endpoint URL
    pub endpoint: Option<String>,

    /// Model identifier (e.g. "gemma2-9b-it")
    pub model: Option<String>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Prompt layout: "system" (system + user turns) or "single" (one user turn)
    pub prompt_layout: Option<String>,

    /// Vocabulary hint appended to single-turn prompts
    pub vocabulary: Option<String>,
}

/// Recognition-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct RecognitionFileConfig {
    /// Recognition endpoint override (`{region}` is substituted)
    pub endpoint: Option<String>,

    /// RMS energy above which a chunk counts as speech
    pub energy_threshold: Option<f32>,

    /// Trailing silence that ends an utterance, in milliseconds
    pub silence_ms: Option<u64>,

    /// Interval between interim transcriptions, in milliseconds (0 disables)
    pub interim_ms: Option<u64>,
}

/// TTS-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// Voice list endpoint override (`{region}` is substituted)
    pub voices_endpoint: Option<String>,

    /// Synthesis endpoint override (`{region}` is substituted)
    pub synthesis_endpoint: Option<String>,

    /// Token issuing endpoint override (`{region}` is substituted)
    pub token_endpoint: Option<String>,

    /// Audio output format header value
    pub output_format: Option<String>,

    /// Marker appended to preview voice labels
    pub preview_marker: Option<String>,

    /// Message shown when a TTS request fails
    pub retry_message: Option<String>,

    /// Default utterance text per locale (or locale prefix); "default" is the fallback
    #[serde(default)]
    pub default_texts: BTreeMap<String, String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `SpeechdeskConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> SpeechdeskConfigFile {
    config_file_path().map_or_else(SpeechdeskConfigFile::default, |path| load_from(&path))
}

/// Load a config file from an explicit path, falling back to defaults
pub fn load_from(path: &Path) -> SpeechdeskConfigFile {
    if !path.exists() {
        return SpeechdeskConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
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
                SpeechdeskConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            SpeechdeskConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/speechdesk/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("speechdesk").join("config.toml"))
}
