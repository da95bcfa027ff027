//! Per-region voice catalog
//!
//! The voice list is fetched once with a bearer token and indexed by locale
//! (display labels) and by voice short name (capability lists).

use std::collections::{BTreeMap, HashMap};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::region_url;
use crate::{Error, Result};

/// Status value of voices that are hidden from the catalog
const DEPRECATED: &str = "Deprecated";

/// Status value of voices that get the preview marker
const PREVIEW: &str = "Preview";

/// Languages written right to left
const RIGHT_TO_LEFT: [&str; 4] = ["ar", "he", "ur", "fa"];

/// One entry of the voices list endpoint
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct VoiceEntry {
    #[serde(default)]
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub local_name: String,
    pub short_name: String,
    #[serde(default)]
    pub gender: String,
    pub locale: String,
    #[serde(default)]
    pub locale_name: Option<String>,
    #[serde(default)]
    pub voice_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub style_list: Option<Vec<String>>,
    #[serde(default)]
    pub role_play_list: Option<Vec<String>>,
    #[serde(default)]
    pub secondary_locale_list: Option<Vec<String>>,
}

/// A voice as offered for one locale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceOption {
    /// Voice short name, used in SSML
    pub short_name: String,
    /// Human-readable label
    pub label: String,
}

/// Voices grouped by locale plus per-voice capabilities
#[derive(Debug, Clone, Default)]
pub struct VoiceCatalog {
    voices: BTreeMap<String, Vec<VoiceOption>>,
    locale_names: BTreeMap<String, String>,
    styles: HashMap<String, Vec<String>>,
    role_plays: HashMap<String, Vec<String>>,
    secondary_locales: HashMap<String, Vec<String>>,
}

impl VoiceCatalog {
    /// Index a raw voice list
    ///
    /// Entries are stably sorted by voice type so neural voices come first;
    /// deprecated voices are skipped.
    #[must_use]
    pub fn from_entries(mut entries: Vec<VoiceEntry>, preview_marker: &str) -> Self {
        entries.sort_by(|a, b| a.voice_type.cmp(&b.voice_type));

        let mut catalog = Self::default();
        for entry in entries {
            if entry.status == DEPRECATED {
                continue;
            }

            let label = voice_label(&entry, preview_marker);
            if let Some(name) = entry.locale_name {
                catalog.locale_names.entry(entry.locale.clone()).or_insert(name);
            }
            catalog
                .voices
                .entry(entry.locale)
                .or_default()
                .push(VoiceOption {
                    short_name: entry.short_name.clone(),
                    label,
                });

            if let Some(styles) = entry.style_list.filter(|l| !l.is_empty()) {
                catalog.styles.insert(entry.short_name.clone(), styles);
            }
            if let Some(roles) = entry.role_play_list.filter(|l| !l.is_empty()) {
                catalog.role_plays.insert(entry.short_name.clone(), roles);
            }
            if let Some(locales) = entry.secondary_locale_list.filter(|l| !l.is_empty()) {
                catalog.secondary_locales.insert(entry.short_name, locales);
            }
        }

        tracing::debug!(locales = catalog.voices.len(), "voice catalog indexed");
        catalog
    }

    /// True when no voices were loaded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Locales with at least one voice, sorted
    pub fn locales(&self) -> impl Iterator<Item = &str> {
        self.voices.keys().map(String::as_str)
    }

    /// Human-readable name of a locale, falling back to the tag itself
    #[must_use]
    pub fn locale_name<'a>(&'a self, locale: &'a str) -> &'a str {
        self.locale_names.get(locale).map_or(locale, String::as_str)
    }

    /// Voices offered for a locale, in catalog order
    #[must_use]
    pub fn voices_for(&self, locale: &str) -> &[VoiceOption] {
        self.voices.get(locale).map(Vec::as_slice).unwrap_or_default()
    }

    /// Expressive styles of a voice
    #[must_use]
    pub fn styles_for(&self, voice: &str) -> Option<&[String]> {
        self.styles.get(voice).map(Vec::as_slice)
    }

    /// Role-play personas of a voice
    #[must_use]
    pub fn role_plays_for(&self, voice: &str) -> Option<&[String]> {
        self.role_plays.get(voice).map(Vec::as_slice)
    }

    /// Secondary locales a voice can switch to
    #[must_use]
    pub fn secondary_locales_for(&self, voice: &str) -> Option<&[String]> {
        self.secondary_locales.get(voice).map(Vec::as_slice)
    }
}

/// Display label: name, neural marker, localized name, preview marker
#[must_use]
pub fn voice_label(entry: &VoiceEntry, preview_marker: &str) -> String {
    let mut label = entry.display_name.clone();
    if entry.voice_type == "Neural" {
        label.push_str(" (Neural)");
    }
    if !entry.local_name.is_empty() && entry.local_name != entry.display_name {
        label.push_str(" - ");
        label.push_str(&entry.local_name);
    }
    if entry.status == PREVIEW {
        label.push_str(" - ");
        label.push_str(preview_marker);
    }
    label
}

/// Readable label for a style identifier (`customerservice` → `Customer Service`)
#[must_use]
pub fn style_label(style: &str) -> String {
    let mut chars = style.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    capitalized
        .replacen("Customerservice", "Customer Service", 1)
        .replacen("Voiceassistant", "Voice Assistant", 1)
}

/// Sample utterance for a locale: exact match, then prefix match, then `default`
#[must_use]
pub fn default_text_for(texts: &BTreeMap<String, String>, locale: &str) -> String {
    if let Some(text) = texts.get(locale) {
        return text.clone();
    }
    texts
        .iter()
        .find(|(key, _)| key.as_str() != "default" && locale.starts_with(key.as_str()))
        .or_else(|| texts.get_key_value("default"))
        .map(|(_, text)| text.clone())
        .unwrap_or_default()
}

/// Whether text in this locale runs right to left
#[must_use]
pub fn is_right_to_left(locale: &str) -> bool {
    locale
        .get(..2)
        .is_some_and(|prefix| RIGHT_TO_LEFT.contains(&prefix))
}

/// Fetches voice lists and access tokens
pub struct CatalogClient {
    client: reqwest::Client,
    voices_endpoint: String,
    token_endpoint: String,
}

impl CatalogClient {
    /// Create a client from endpoint templates containing `{region}`
    #[must_use]
    pub fn new(voices_endpoint: &str, token_endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            voices_endpoint: voices_endpoint.to_string(),
            token_endpoint: token_endpoint.to_string(),
        }
    }

    /// Exchange a subscription key for a short-lived bearer token
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a non-success status
    pub async fn issue_token(
        &self,
        region: &str,
        subscription_key: &SecretString,
    ) -> Result<SecretString> {
        let response = self
            .client
            .post(region_url(&self.token_endpoint, region))
            .header("Ocp-Apim-Subscription-Key", subscription_key.expose_secret())
            .header("Content-Length", "0")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = %status, "token request failed");
            return Err(Error::Catalog(format!("token request failed: {status}")));
        }

        Ok(SecretString::from(response.text().await?))
    }

    /// Fetch the raw voice list for a region
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, a non-success status or a malformed body
    pub async fn fetch(&self, region: &str, token: &SecretString) -> Result<Vec<VoiceEntry>> {
        let response = self
            .client
            .get(region_url(&self.voices_endpoint, region))
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "voice list request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = %status, "voice list API error");
            return Err(Error::Catalog(format!("voice list request failed: {status}")));
        }

        let entries: Vec<VoiceEntry> = response.json().await?;
        tracing::info!(voices = entries.len(), region, "fetched voice list");
        Ok(entries)
    }

    /// Fetch and index the catalog; on failure the catalog is empty and the
    /// error is returned alongside it
    pub async fn load(
        &self,
        region: &str,
        token: &SecretString,
        preview_marker: &str,
    ) -> (VoiceCatalog, Option<Error>) {
        match self.fetch(region, token).await {
            Ok(entries) => (VoiceCatalog::from_entries(entries, preview_marker), None),
            Err(e) => {
                tracing::warn!(error = %e, "voice catalog unavailable");
                (VoiceCatalog::default(), Some(e))
            }
        }
    }
}
