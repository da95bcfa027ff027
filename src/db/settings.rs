//! Persistent user preferences
//!
//! A flat key/value table. Reads fall back to built-in defaults, writes are
//! best-effort and durable as soon as they return.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;

use super::DbPool;
use crate::voice::AudioInput;
use crate::{Error, Result};

/// Sentinel microphone id meaning "the host's default input device"
pub const DEFAULT_MICROPHONE: &str = "default";

/// Prompt inserted by `settings default-prompt`
pub const DEFAULT_TRANSLATION_PROMPT: &str = "Please translate the following text into English fixing any mistakes etc. (with no extra information or explanation)";

/// A named user preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// Speech service subscription key
    SubscriptionKey,
    /// Speech service region
    Region,
    /// Recognition language tag
    Language,
    /// Microphone device id
    Microphone,
    /// Whether recognized text is sent for translation
    TranslationEnabled,
    /// Chat-completion API key
    TranslationApiKey,
    /// Prompt sent alongside each recognized utterance
    TranslationPrompt,
}

impl SettingKey {
    /// Every key, in display order
    pub const ALL: [Self; 7] = [
        Self::SubscriptionKey,
        Self::Region,
        Self::Language,
        Self::Microphone,
        Self::TranslationEnabled,
        Self::TranslationApiKey,
        Self::TranslationPrompt,
    ];

    /// Identifier the value is stored under
    #[must_use]
    pub const fn storage_name(self) -> &'static str {
        match self {
            Self::SubscriptionKey => "subscriptionKey",
            Self::Region => "region",
            Self::Language => "language",
            Self::Microphone => "microphone",
            Self::TranslationEnabled => "groqTranslation",
            Self::TranslationApiKey => "groqAPIKey",
            Self::TranslationPrompt => "llmPrompt",
        }
    }

    /// Value returned when nothing has been stored
    #[must_use]
    pub const fn default_value(self) -> &'static str {
        match self {
            Self::Region => "eastasia",
            Self::Language => "en-US",
            Self::Microphone => DEFAULT_MICROPHONE,
            Self::TranslationEnabled => "false",
            Self::SubscriptionKey | Self::TranslationApiKey | Self::TranslationPrompt => "",
        }
    }

    /// Whether the value holds a credential and should be masked when shown
    #[must_use]
    pub const fn is_secret(self) -> bool {
        matches!(self, Self::SubscriptionKey | Self::TranslationApiKey)
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_name())
    }
}

impl FromStr for SettingKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|k| k.storage_name().eq_ignore_ascii_case(wanted))
            .or_else(|| match wanted.to_ascii_lowercase().as_str() {
                "subscription-key" | "key" => Some(Self::SubscriptionKey),
                "translation" | "translation-enabled" => Some(Self::TranslationEnabled),
                "api-key" | "translation-api-key" => Some(Self::TranslationApiKey),
                "prompt" | "translation-prompt" => Some(Self::TranslationPrompt),
                "mic" => Some(Self::Microphone),
                _ => None,
            })
            .ok_or_else(|| Error::Config(format!("unknown setting: {wanted}")))
    }
}

/// Snapshot of every preference, loaded once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub subscription_key: String,
    pub region: String,
    pub language: String,
    pub microphone: String,
    pub translation_enabled: bool,
    pub translation_api_key: String,
    pub translation_prompt: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            subscription_key: String::new(),
            region: SettingKey::Region.default_value().to_string(),
            language: SettingKey::Language.default_value().to_string(),
            microphone: DEFAULT_MICROPHONE.to_string(),
            translation_enabled: false,
            translation_api_key: String::new(),
            translation_prompt: String::new(),
        }
    }
}

/// Settings repository
#[derive(Clone)]
pub struct SettingsStore {
    pool: DbPool,
}

impl SettingsStore {
    /// Create a new settings store
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Read a raw stored value, `None` when absent
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn read(&self, key: SettingKey) -> Result<Option<String>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                [key.storage_name()],
                |row| row.get(0),
            )
            .ok();

        Ok(value)
    }

    /// Write a raw value
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn write(&self, key: SettingKey, value: &str) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            [key.storage_name(), value, now.as_str()],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Get a value, falling back to the key's default
    #[must_use]
    pub fn get(&self, key: SettingKey) -> String {
        match self.read(key) {
            Ok(Some(value)) => value,
            Ok(None) => key.default_value().to_string(),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to read setting");
                key.default_value().to_string()
            }
        }
    }

    /// Get a boolean value; only the literal `true` is true
    #[must_use]
    pub fn get_bool(&self, key: SettingKey) -> bool {
        self.get(key) == "true"
    }

    /// Store a value; failures are logged and otherwise ignored
    pub fn set(&self, key: SettingKey, value: &str) {
        tracing::debug!(key = %key, "saving setting");
        if let Err(e) = self.write(key, value) {
            tracing::warn!(key = %key, error = %e, "failed to save setting");
        }
    }

    /// Store a boolean value
    pub fn set_bool(&self, key: SettingKey, value: bool) {
        self.set(key, if value { "true" } else { "false" });
    }

    /// Replace the translation prompt with the built-in default
    pub fn reset_prompt(&self) {
        self.set(SettingKey::TranslationPrompt, DEFAULT_TRANSLATION_PROMPT);
    }

    /// Load every preference
    #[must_use]
    pub fn load(&self) -> Settings {
        Settings {
            subscription_key: self.get(SettingKey::SubscriptionKey),
            region: self.get(SettingKey::Region),
            language: self.get(SettingKey::Language),
            microphone: self.get(SettingKey::Microphone),
            translation_enabled: self.get_bool(SettingKey::TranslationEnabled),
            translation_api_key: self.get(SettingKey::TranslationApiKey),
            translation_prompt: self.get(SettingKey::TranslationPrompt),
        }
    }
}

/// Pick the stored microphone if it is still attached, otherwise the default device
#[must_use]
pub fn resolve_microphone(stored: &str, devices: &[AudioInput]) -> String {
    if !stored.is_empty() && devices.iter().any(|d| d.id == stored) {
        stored.to_string()
    } else {
        DEFAULT_MICROPHONE.to_string()
    }
}
